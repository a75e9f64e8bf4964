use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use crate::{
    error::{AppError, AppResult},
    handlers::success,
    models::{CircleDeleteRequest, GroupInput, GroupKind, WorkingGroupDeleteRequest},
    repository::RepositoryState,
};

async fn save_group(
    repo: &RepositoryState,
    kind: GroupKind,
    input: GroupInput,
) -> AppResult<Value> {
    let input = input.cleaned().map_err(AppError::Validation)?;
    let group = repo.save_group(kind, input).await?;
    tracing::info!(group_id = group.id, kind = kind.as_str(), "group saved");
    serde_json::to_value(group).map_err(|e| AppError::Internal(e.to_string()))
}

// --- Working groups ---

/// save_working_group
///
/// [Organizer Route] Creates or updates a working group. The member list replaces the
/// stored one; every member must name an existing activist.
#[utoipa::path(
    post,
    path = "/working_group/save",
    request_body = GroupInput,
    responses((status = 200, description = "{status, working_group}"))
)]
pub async fn save_working_group(
    State(repo): State<RepositoryState>,
    payload: Result<Json<GroupInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(input) = payload?;
    let group = save_group(&repo, GroupKind::WorkingGroup, input).await?;
    Ok(Json(json!({ "status": "success", "working_group": group })))
}

#[utoipa::path(
    post,
    path = "/working_group/list",
    responses((status = 200, description = "{status, working_groups}"))
)]
pub async fn list_working_groups(State(repo): State<RepositoryState>) -> AppResult<Json<Value>> {
    let groups = repo.list_groups(GroupKind::WorkingGroup).await?;
    Ok(Json(json!({ "status": "success", "working_groups": groups })))
}

#[utoipa::path(
    post,
    path = "/working_group/delete",
    request_body = WorkingGroupDeleteRequest,
    responses((status = 200, description = "{status}"))
)]
pub async fn delete_working_group(
    State(repo): State<RepositoryState>,
    payload: Result<Json<WorkingGroupDeleteRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    repo.delete_group(GroupKind::WorkingGroup, request.working_group_id)
        .await?;
    tracing::info!(group_id = request.working_group_id, "working group deleted");
    Ok(success())
}

// --- Circles ---

#[utoipa::path(
    post,
    path = "/circle/save",
    request_body = GroupInput,
    responses((status = 200, description = "{status, circle}"))
)]
pub async fn save_circle(
    State(repo): State<RepositoryState>,
    payload: Result<Json<GroupInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(input) = payload?;
    let circle = save_group(&repo, GroupKind::Circle, input).await?;
    Ok(Json(json!({ "status": "success", "circle": circle })))
}

#[utoipa::path(
    post,
    path = "/circle/list",
    responses((status = 200, description = "{status, circles}"))
)]
pub async fn list_circles(State(repo): State<RepositoryState>) -> AppResult<Json<Value>> {
    let circles = repo.list_groups(GroupKind::Circle).await?;
    Ok(Json(json!({ "status": "success", "circles": circles })))
}

#[utoipa::path(
    post,
    path = "/circle/delete",
    request_body = CircleDeleteRequest,
    responses((status = 200, description = "{status}"))
)]
pub async fn delete_circle(
    State(repo): State<RepositoryState>,
    payload: Result<Json<CircleDeleteRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    repo.delete_group(GroupKind::Circle, request.circle_id).await?;
    tracing::info!(group_id = request.circle_id, "circle deleted");
    Ok(success())
}
