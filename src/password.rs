use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Hash a raw credential into a PHC string (Argon2id, random salt).
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!("password hashing failed: {e}")
        })
}

/// `Ok(false)` on mismatch, `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!("stored password hash is malformed: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_credential_verifies() {
        let hash = hash_password("secret1").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1", &hash).expect("verify should succeed"));
    }

    #[test]
    fn hash_never_contains_plaintext() {
        let hash = hash_password("hunter22").unwrap();
        assert!(!hash.contains("hunter22"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("password123").unwrap();
        let b = hash_password("password123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("secret1").unwrap();
        assert!(!verify_password("secret2", &hash).expect("verify should not error"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("secret1", "plaintext-not-a-hash").is_err());
    }
}
