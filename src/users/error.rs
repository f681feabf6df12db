use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

/// Per-field validation messages, fields in stable order, messages in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), UserError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(UserError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("validation failed on: {}", .0.fields().collect::<Vec<_>>().join(", "))]
    Validation(FieldErrors),

    #[error("user not found")]
    NotFound,

    /// Lost a uniqueness race at the store after passing the advisory check.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("action not permitted")]
    Forbidden,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type UserResult<T> = Result<T, UserError>;

pub const EMAIL_TAKEN: &str = "This email address is already taken by another user.";

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::Conflict(_) => StatusCode::CONFLICT,
            UserError::Forbidden => StatusCode::FORBIDDEN,
            UserError::Database(_) | UserError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            UserError::Validation(errors) => json!({
                "success": false,
                "message": "The given data was invalid.",
                "errors": errors,
            }),
            UserError::NotFound => json!({
                "success": false,
                "message": "User not found.",
            }),
            UserError::Conflict(message) => {
                warn!(%message, "store rejected write on unique constraint");
                json!({
                    "success": false,
                    "message": message,
                    "errors": { "email": [EMAIL_TAKEN] },
                })
            }
            UserError::Forbidden => json!({
                "success": false,
                "message": "This action is unauthorized.",
            }),
            UserError::Database(e) => {
                error!(error = ?e, "database error");
                json!({ "success": false, "message": "Server Error" })
            }
            UserError::Internal(e) => {
                error!(error = ?e, "internal error");
                json!({ "success": false, "message": "Server Error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for UserError {
    fn from(rejection: JsonRejection) -> Self {
        UserError::Validation(FieldErrors::single("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for UserError {
    fn from(rejection: QueryRejection) -> Self {
        UserError::Validation(FieldErrors::single("query", rejection.body_text()))
    }
}

impl From<PathRejection> for UserError {
    fn from(_: PathRejection) -> Self {
        UserError::NotFound
    }
}
