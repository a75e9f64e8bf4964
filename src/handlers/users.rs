use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{AdbUser, Role, UserInput, UserRoleRequest},
    repository::RepositoryState,
};

/// list_users
///
/// [Admin Route] Every ADB user with their roles.
#[utoipa::path(
    get,
    path = "/user/list",
    responses(
        (status = 200, description = "Array of users", body = Vec<AdbUser>),
        (status = 403, description = "Missing the admin role")
    )
)]
pub async fn list_users(State(repo): State<RepositoryState>) -> AppResult<Json<Vec<AdbUser>>> {
    Ok(Json(repo.list_users().await?))
}

/// save_user
///
/// [Admin Route] Creates (`id == 0`) or updates a user. Emails are stored lowercased
/// and must be unique.
#[utoipa::path(
    post,
    path = "/user/save",
    request_body = UserInput,
    responses((status = 200, description = "{status, user}"))
)]
pub async fn save_user(
    State(repo): State<RepositoryState>,
    AuthUser(admin): AuthUser,
    payload: Result<Json<UserInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(input) = payload?;
    let input = input.cleaned();
    if input.email.is_empty() {
        return Err(AppError::validation("User email cannot be empty"));
    }

    let user = repo.save_user(input).await?;
    tracing::info!(user_id = user.id, by = admin.id, "user saved");
    Ok(Json(json!({ "status": "success", "user": user })))
}

#[utoipa::path(
    post,
    path = "/user/delete",
    request_body = UserInput,
    responses((status = 200, description = "{status, userID}"))
)]
pub async fn delete_user(
    State(repo): State<RepositoryState>,
    AuthUser(admin): AuthUser,
    payload: Result<Json<UserInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(input) = payload?;
    if input.id == admin.id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    repo.delete_user(input.id).await?;
    tracing::info!(user_id = input.id, by = admin.id, "user deleted");
    Ok(Json(json!({ "status": "success", "userID": input.id })))
}

fn parse_role(request: &UserRoleRequest) -> AppResult<Role> {
    Role::parse(&request.role)
        .ok_or_else(|| AppError::validation(format!("Invalid role: {:?}", request.role)))
}

/// add_user_role
///
/// [Admin Route] Grants one of `admin`, `organizer`, `attendance`. Granting a role the
/// user already holds is a no-op.
#[utoipa::path(
    post,
    path = "/users-roles/add",
    request_body = UserRoleRequest,
    responses((status = 200, description = "{status, user_id}"))
)]
pub async fn add_user_role(
    State(repo): State<RepositoryState>,
    payload: Result<Json<UserRoleRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let role = parse_role(&request)?;
    repo.add_user_role(request.user_id, role).await?;
    tracing::info!(user_id = request.user_id, role = role.as_str(), "role granted");
    Ok(Json(json!({ "status": "success", "user_id": request.user_id })))
}

#[utoipa::path(
    post,
    path = "/users-roles/remove",
    request_body = UserRoleRequest,
    responses((status = 200, description = "{status, user_id}"))
)]
pub async fn remove_user_role(
    State(repo): State<RepositoryState>,
    payload: Result<Json<UserRoleRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let role = parse_role(&request)?;
    repo.remove_user_role(request.user_id, role).await?;
    tracing::info!(user_id = request.user_id, role = role.as_str(), "role revoked");
    Ok(Json(json!({ "status": "success", "user_id": request.user_id })))
}
