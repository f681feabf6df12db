use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::{
    password::hash_password,
    users::{
        dto::{CreateUserRequest, PublicUser, UpdateUserRequest},
        error::{FieldErrors, UserError, UserResult, EMAIL_TAKEN},
        repo::UserStore,
        repo_types::{NewUser, UserChanges},
        validation::{
            normalize_email, normalize_name, replacement_password, text_of, validate_create,
            validate_update, ListParams,
        },
    },
};

/// Pagination facts for one page of a filtered, ordered listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: i64,
    pub last_page: i64,
    pub per_page: i64,
    pub total: i64,
    /// 1-based index of the first item on this page; `None` when empty.
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PageMeta {
    pub fn new(page: i64, per_page: i64, total: i64, returned: usize) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        let offset = page_offset(page, per_page);
        let (from, to) = if returned == 0 {
            (None, None)
        } else {
            (Some(offset + 1), Some(offset + returned as i64))
        };
        Self {
            current_page: page,
            last_page,
            per_page,
            total,
            from,
            to,
            has_prev: page > 1,
            has_next: page < last_page,
        }
    }
}

fn page_offset(page: i64, per_page: i64) -> i64 {
    (page - 1).saturating_mul(per_page)
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub items: Vec<PublicUser>,
    pub meta: PageMeta,
}

/// List, create, show, update and delete over a [`UserStore`].
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, params: &ListParams) -> UserResult<UserPage> {
        let search = params.search.as_deref();
        let total = self.store.count(search).await?;
        let offset = page_offset(params.page, params.per_page);

        // Past the end: no need to ask the store for rows.
        let rows = if offset >= total {
            Vec::new()
        } else {
            self.store
                .list(search, params.sort_by, params.sort_order, params.per_page, offset)
                .await?
        };

        let meta = PageMeta::new(params.page, params.per_page, total, rows.len());
        debug!(total, returned = rows.len(), "user page");
        Ok(UserPage {
            items: rows.into_iter().map(PublicUser::from).collect(),
            meta,
        })
    }

    /// Adds the advisory uniqueness message when the email is otherwise valid.
    async fn check_email_free(
        &self,
        errors: &mut FieldErrors,
        email: &str,
        except_id: Option<i64>,
    ) -> UserResult<()> {
        if !errors.has("email") && self.store.email_taken(email, except_id).await? {
            errors.add("email", EMAIL_TAKEN);
        }
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: &CreateUserRequest) -> UserResult<PublicUser> {
        let mut errors = validate_create(input);
        let name = normalize_name(text_of(&input.name));
        let email = normalize_email(text_of(&input.email));
        self.check_email_free(&mut errors, &email, None).await?;
        errors.into_result()?;

        let password = text_of(&input.password);
        let password_hash = hash_password(password)?;
        let row = self
            .store
            .insert(NewUser {
                name,
                email,
                password_hash,
            })
            .await?;

        info!(user_id = row.id, email = %row.email, "user created");
        Ok(row.into())
    }

    #[instrument(skip(self))]
    pub async fn show(&self, id: i64) -> UserResult<PublicUser> {
        self.store
            .find_by_id(id)
            .await?
            .map(PublicUser::from)
            .ok_or(UserError::NotFound)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i64, input: &UpdateUserRequest) -> UserResult<PublicUser> {
        if self.store.find_by_id(id).await?.is_none() {
            return Err(UserError::NotFound);
        }

        let mut errors = validate_update(id, input);
        let name = normalize_name(text_of(&input.name));
        let email = normalize_email(text_of(&input.email));
        self.check_email_free(&mut errors, &email, Some(id)).await?;
        errors.into_result()?;

        let password_hash = replacement_password(input).map(hash_password).transpose()?;
        let password_changed = password_hash.is_some();
        let row = self
            .store
            .update(
                id,
                UserChanges {
                    name,
                    email,
                    password_hash,
                },
            )
            .await?
            .ok_or(UserError::NotFound)?;

        info!(user_id = row.id, password_changed, "user updated");
        Ok(row.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> UserResult<()> {
        if !self.store.delete(id).await? {
            return Err(UserError::NotFound);
        }
        info!(user_id = id, "user deleted");
        Ok(())
    }
}
