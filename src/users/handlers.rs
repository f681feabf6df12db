use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::Html,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    state::AppState,
    users::{
        dto::{
            CreateUserRequest, ListResponse, ListUsersQuery, MessageResponse, PaginationBody,
            UpdateUserRequest, UserResponse,
        },
        error::{UserError, UserResult},
        policy::UserAction,
        services::PageMeta,
        validation::validate_list,
    },
};

const USERS_PAGE: &str = include_str!("../../assets/users.html");

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(index).post(create_user))
        .route("/users/data", get(list_users))
        .route(
            "/users/:id",
            get(show_user).put(update_user).delete(delete_user),
        )
}

pub async fn index() -> Html<&'static str> {
    Html(USERS_PAGE)
}

/// `{origin}/users/data?{query with page replaced}`.
fn page_url(origin: &str, query: &ListUsersQuery, page: i64) -> UserResult<String> {
    let query = ListUsersQuery {
        page: Some(page.to_string()),
        ..query.clone()
    };
    let qs = serde_urlencoded::to_string(&query).map_err(anyhow::Error::from)?;
    Ok(format!("{origin}/users/data?{qs}"))
}

fn pagination_body(
    origin: &str,
    query: &ListUsersQuery,
    meta: &PageMeta,
) -> UserResult<PaginationBody> {
    let prev_page_url = meta
        .has_prev
        .then(|| page_url(origin, query, meta.current_page - 1))
        .transpose()?;
    let next_page_url = meta
        .has_next
        .then(|| page_url(origin, query, meta.current_page + 1))
        .transpose()?;
    Ok(PaginationBody {
        current_page: meta.current_page,
        last_page: meta.last_page,
        per_page: meta.per_page,
        total: meta.total,
        from: meta.from,
        to: meta.to,
        prev_page_url,
        next_page_url,
    })
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> UserResult<Json<ListResponse>> {
    state.policy.check(UserAction::List)?;
    let Query(query) = query?;
    let params = validate_list(&query).map_err(UserError::Validation)?;
    let page = state.users.list(&params).await?;

    let origin = state.config.public_url.as_deref().unwrap_or("");
    let pagination = pagination_body(origin, &query, &page.meta)?;
    Ok(Json(ListResponse {
        success: true,
        data: page.items,
        pagination,
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> UserResult<Json<UserResponse>> {
    state.policy.check(UserAction::Create)?;
    let Json(input) = payload?;
    let user = state.users.create(&input).await?;
    Ok(Json(UserResponse {
        success: true,
        message: Some("User created successfully!"),
        data: user,
    }))
}

#[instrument(skip(state))]
pub async fn show_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> UserResult<Json<UserResponse>> {
    state.policy.check(UserAction::View)?;
    let Path(id) = id?;
    let user = state.users.show(id).await?;
    Ok(Json(UserResponse {
        success: true,
        message: None,
        data: user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> UserResult<Json<UserResponse>> {
    state.policy.check(UserAction::Update)?;
    let Path(id) = id?;
    let Json(input) = payload?;
    let user = state.users.update(id, &input).await?;
    Ok(Json(UserResponse {
        success: true,
        message: Some("User updated successfully!"),
        data: user,
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> UserResult<Json<MessageResponse>> {
    state.policy.check(UserAction::Delete)?;
    let Path(id) = id?;
    state.users.delete(id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "User deleted successfully!",
    }))
}
