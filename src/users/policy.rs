use crate::users::error::{UserError, UserResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    List,
    View,
    Create,
    Update,
    Delete,
}

/// Decides whether the caller may perform an action. Consulted by handlers
/// before the service runs.
pub trait AccessPolicy: Send + Sync {
    fn authorize(&self, action: UserAction) -> bool;

    fn check(&self, action: UserAction) -> UserResult<()> {
        if self.authorize(action) {
            Ok(())
        } else {
            tracing::warn!(?action, "action denied by policy");
            Err(UserError::Forbidden)
        }
    }
}

/// Permits everything; the directory ships without authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authorize(&self, _action: UserAction) -> bool {
        true
    }
}
