use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::users::{
    error::{UserError, UserResult},
    repo_types::{NewUser, SortKey, SortOrder, UserChanges, UserRow},
};

/// Persistence seam for users. The store's unique index on `email` is the
/// authority on uniqueness; `email_taken` is only an advisory pre-check.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Rows whose name or email contains `search`, case-insensitively.
    async fn count(&self, search: Option<&str>) -> UserResult<i64>;

    async fn list(
        &self,
        search: Option<&str>,
        sort_by: SortKey,
        sort_order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<UserRow>>;

    async fn find_by_id(&self, id: i64) -> UserResult<Option<UserRow>>;

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> UserResult<bool>;

    /// Fails with `UserError::Conflict` when the email is already stored.
    async fn insert(&self, user: NewUser) -> UserResult<UserRow>;

    /// `Ok(None)` when the row no longer exists.
    async fn update(&self, id: i64, changes: UserChanges) -> UserResult<Option<UserRow>>;

    /// `Ok(false)` when nothing was removed.
    async fn delete(&self, id: i64) -> UserResult<bool>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// Escape LIKE metacharacters so the term matches literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_search_filter(qb: &mut QueryBuilder<'_, Postgres>, search: Option<&str>) {
    if let Some(term) = search {
        let pattern = like_pattern(term);
        qb.push(" WHERE (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn map_write_error(e: sqlx::Error) -> UserError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return UserError::Conflict("email already in use".into());
        }
    }
    UserError::Database(e)
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn count(&self, search: Option<&str>) -> UserResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_search_filter(&mut qb, search);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.db).await?;
        Ok(total)
    }

    async fn list(
        &self,
        search: Option<&str>,
        sort_by: SortKey,
        sort_order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<UserRow>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_search_filter(&mut qb, search);
        // Column and direction come from closed enums, never from input text.
        let dir = sort_order.keyword();
        qb.push(format!(" ORDER BY {} {dir}, id {dir}", sort_by.column()))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = qb.build_query_as::<UserRow>().fetch_all(&self.db).await?;
        debug!(rows = rows.len(), limit, offset, "listed users");
        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> UserResult<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> UserResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.db)
        .await?;
        Ok(taken)
    }

    async fn insert(&self, user: NewUser) -> UserResult<UserRow> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> UserResult<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name = $2,
                   email = $3,
                   password_hash = COALESCE($4, password_hash),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.password_hash.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_error)
    }

    async fn delete(&self, id: i64) -> UserResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
