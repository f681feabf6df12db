use std::{cmp::Ordering, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::{
    error::{UserError, UserResult},
    repo::UserStore,
    repo_types::{NewUser, SortKey, SortOrder, UserChanges, UserRow},
};

/// In-process store with the same id and uniqueness rules as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: Vec<UserRow>,
}

fn matches(row: &UserRow, search: Option<&str>) -> bool {
    match search {
        None => true,
        Some(term) => {
            let term = term.to_lowercase();
            row.name.to_lowercase().contains(&term) || row.email.to_lowercase().contains(&term)
        }
    }
}

fn folded(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit creation time, for ordering tests.
    pub fn insert_at(&self, user: NewUser, created_at: OffsetDateTime) -> UserResult<UserRow> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.rows.iter().any(|r| r.email == user.email) {
            return Err(UserError::Conflict("email already in use".into()));
        }
        inner.next_id += 1;
        let row = UserRow {
            id: inner.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at,
            updated_at: created_at,
        };
        inner.rows.push(row.clone());
        Ok(row)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store lock").rows.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn count(&self, search: Option<&str>) -> UserResult<i64> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.rows.iter().filter(|r| matches(r, search)).count() as i64)
    }

    async fn list(
        &self,
        search: Option<&str>,
        sort_by: SortKey,
        sort_order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> UserResult<Vec<UserRow>> {
        let inner = self.inner.lock().expect("store lock");
        let mut rows: Vec<UserRow> = inner
            .rows
            .iter()
            .filter(|r| matches(r, search))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let primary = match sort_by {
                // Case-folded first, like the default Postgres collation.
                SortKey::Name => folded(&a.name, &b.name),
                SortKey::Email => folded(&a.email, &b.email),
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            let ord = primary.then(a.id.cmp(&b.id));
            match sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        Ok(rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> UserResult<Option<UserRow>> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.rows.iter().find(|r| r.id == id).cloned())
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> UserResult<bool> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .rows
            .iter()
            .any(|r| r.email == email && Some(r.id) != except_id))
    }

    async fn insert(&self, user: NewUser) -> UserResult<UserRow> {
        self.insert_at(user, OffsetDateTime::now_utc())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> UserResult<Option<UserRow>> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner
            .rows
            .iter()
            .any(|r| r.email == changes.email && r.id != id)
        {
            return Err(UserError::Conflict("email already in use".into()));
        }
        let Some(row) = inner.rows.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        row.name = changes.name;
        row.email = changes.email;
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        row.updated_at = OffsetDateTime::now_utc().max(row.updated_at);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> UserResult<bool> {
        let mut inner = self.inner.lock().expect("store lock");
        let before = inner.rows.len();
        inner.rows.retain(|r| r.id != id);
        Ok(inner.rows.len() < before)
    }
}
