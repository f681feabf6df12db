//! Pure input rules. Nothing here touches the store; the email uniqueness
//! check is layered on top by the service.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::users::{
    dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest},
    error::FieldErrors,
    repo_types::{SortKey, SortOrder},
};

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 255;
pub const EMAIL_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 255;
pub const SEARCH_MAX: usize = 100;
pub const PER_PAGE_MIN: i64 = 5;
pub const PER_PAGE_MAX: i64 = 100;
pub const DEFAULT_PER_PAGE: i64 = 10;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed name as persisted.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_string()
}

/// Trimmed, lower-cased email as persisted and compared.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Postgres text columns cannot hold NUL.
fn has_nul(value: &str) -> bool {
    value.contains('\0')
}

/// Shape of one JSON body field before any rule runs.
enum Input<'a> {
    Missing,
    Text(&'a str),
    NotText,
}

fn shape(value: &Option<Value>) -> Input<'_> {
    match value {
        None | Some(Value::Null) => Input::Missing,
        Some(Value::String(s)) => Input::Text(s),
        Some(_) => Input::NotText,
    }
}

/// String content of a body field, or `""` when absent or mistyped.
/// Only meaningful after validation passed.
pub fn text_of(value: &Option<Value>) -> &str {
    value.as_ref().and_then(Value::as_str).unwrap_or_default()
}

fn check_name(errors: &mut FieldErrors, name: &Option<Value>) {
    let name = match shape(name) {
        Input::NotText => {
            errors.add("name", "The name must be a valid string.");
            return;
        }
        Input::Missing => None,
        Input::Text(s) => present(Some(s)),
    };
    let Some(name) = name else {
        errors.add("name", "The name field is required.");
        return;
    };
    let len = name.chars().count();
    if len < NAME_MIN {
        errors.add("name", format!("The name must be at least {NAME_MIN} characters."));
    }
    if len > NAME_MAX {
        errors.add("name", format!("The name may not be greater than {NAME_MAX} characters."));
    }
    if has_nul(name) {
        errors.add("name", "The name may not contain null characters.");
    }
}

fn check_email(errors: &mut FieldErrors, email: &Option<Value>) {
    let email = match shape(email) {
        Input::NotText => {
            errors.add("email", "Please enter a valid email address.");
            return;
        }
        Input::Missing => None,
        Input::Text(s) => present(Some(s)),
    };
    let Some(email) = email else {
        errors.add("email", "The email field is required.");
        return;
    };
    if !is_valid_email(email) || has_nul(email) {
        errors.add("email", "Please enter a valid email address.");
    }
    // Lower-casing can lengthen a string; measure what will be stored.
    if normalize_email(email).chars().count() > EMAIL_MAX {
        errors.add("email", format!("The email may not be greater than {EMAIL_MAX} characters."));
    }
}

fn check_password_bounds(errors: &mut FieldErrors, password: &str) {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        errors.add(
            "password",
            format!("The password must be at least {PASSWORD_MIN} characters."),
        );
    }
    if len > PASSWORD_MAX {
        errors.add(
            "password",
            format!("The password may not be greater than {PASSWORD_MAX} characters."),
        );
    }
}

/// Password supplied on update, with empty treated as absent.
pub fn replacement_password(input: &UpdateUserRequest) -> Option<&str> {
    input
        .password
        .as_ref()
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
}

/// Integer from a JSON number or a numeric string.
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn validate_create(input: &CreateUserRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &input.name);
    check_email(&mut errors, &input.email);
    match shape(&input.password) {
        Input::NotText => errors.add("password", "The password must be a valid string."),
        Input::Text(p) if !p.is_empty() => check_password_bounds(&mut errors, p),
        _ => errors.add("password", "The password field is required."),
    }
    errors
}

/// `target_id` is the user addressed by the route; a `user_id` in the body
/// must agree with it.
pub fn validate_update(target_id: i64, input: &UpdateUserRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_name(&mut errors, &input.name);
    check_email(&mut errors, &input.email);
    match shape(&input.password) {
        Input::NotText => errors.add("password", "The password must be a valid string."),
        Input::Text(p) if !p.is_empty() => check_password_bounds(&mut errors, p),
        _ => {}
    }
    match input.user_id.as_ref().filter(|v| !v.is_null()) {
        None => {}
        Some(raw) => match integer(raw) {
            None => errors.add("user_id", "User ID must be a valid integer."),
            Some(id) if id != target_id => {
                errors.add("user_id", "The specified user does not exist.")
            }
            Some(_) => {}
        },
    }
    errors
}

/// Validated list parameters with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub search: Option<String>,
    pub page: i64,
    pub per_page: i64,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
        }
    }
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().filter(|v| !v.is_empty())
}

pub fn validate_list(query: &ListUsersQuery) -> Result<ListParams, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut params = ListParams::default();

    // An empty `search=` is "no filter"; whitespace-only counts as empty too.
    if let Some(search) = present(query.search.as_deref()) {
        if search.chars().count() > SEARCH_MAX {
            errors.add(
                "search",
                format!("The search term may not be greater than {SEARCH_MAX} characters."),
            );
        } else if has_nul(search) {
            errors.add("search", "The search term may not contain null characters.");
        } else {
            params.search = Some(search.to_string());
        }
    }

    if let Some(raw) = non_empty(&query.per_page) {
        match raw.trim().parse::<i64>() {
            Err(_) => errors.add("per_page", "The per page value must be an integer."),
            Ok(n) if n < PER_PAGE_MIN => errors.add(
                "per_page",
                format!("The per page value must be at least {PER_PAGE_MIN}."),
            ),
            Ok(n) if n > PER_PAGE_MAX => errors.add(
                "per_page",
                format!("The per page value may not be greater than {PER_PAGE_MAX}."),
            ),
            Ok(n) => params.per_page = n,
        }
    }

    if let Some(raw) = non_empty(&query.page) {
        match raw.trim().parse::<i64>() {
            Err(_) => errors.add("page", "The page value must be an integer."),
            Ok(n) if n < 1 => errors.add("page", "The page value must be at least 1."),
            Ok(n) => params.page = n,
        }
    }

    if let Some(raw) = non_empty(&query.sort_by) {
        match SortKey::parse(raw) {
            Some(key) => params.sort_by = key,
            None => errors.add(
                "sort_by",
                "The sort by field must be one of: name, email, created_at.",
            ),
        }
    }

    if let Some(raw) = non_empty(&query.sort_order) {
        match SortOrder::parse(raw) {
            Some(order) => params.sort_order = order,
            None => errors.add("sort_order", "The sort order must be either asc or desc."),
        }
    }

    if errors.is_empty() {
        Ok(params)
    } else {
        Err(errors)
    }
}
