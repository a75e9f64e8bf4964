use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    handlers::success,
    models::{
        ActivistFilter, ActivistInput, ActivistRange, HideActivistRequest, MergeActivistRequest,
    },
    repository::RepositoryState,
};

/// activist_names
///
/// [Attendance Route] Names of every non-hidden activist, for autocompletion.
#[utoipa::path(
    get,
    path = "/activist_names/get",
    responses((status = 200, description = "{activist_names: string[]}"))
)]
pub async fn activist_names(State(repo): State<RepositoryState>) -> AppResult<Json<Value>> {
    let names = repo.activist_names().await?;
    Ok(Json(json!({ "activist_names": names })))
}

/// organizer_names
///
/// [Attendance Route] Names of Organizer-level activists.
#[utoipa::path(
    get,
    path = "/activist_names/get_organizers",
    responses((status = 200, description = "{activist_names: string[]}"))
)]
pub async fn organizer_names(State(repo): State<RepositoryState>) -> AppResult<Json<Value>> {
    let names = repo.organizer_names().await?;
    Ok(Json(json!({ "activist_names": names })))
}

/// list_activists
///
/// [Organizer Route] Activists with attendance stats, filtered by name, level and
/// last-event range. Hidden activists are left out unless asked for.
#[utoipa::path(
    post,
    path = "/activist/list",
    request_body = ActivistFilter,
    responses((status = 200, description = "{status, activist_list}"))
)]
pub async fn list_activists(
    State(repo): State<RepositoryState>,
    payload: Result<Json<ActivistFilter>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(filter) = payload?;
    let activists = repo.list_activists(&filter).await?;
    Ok(Json(json!({ "status": "success", "activist_list": activists })))
}

#[utoipa::path(
    get,
    path = "/activist/list_basic",
    responses((status = 200, description = "{status, activists}"))
)]
pub async fn list_activists_basic(State(repo): State<RepositoryState>) -> AppResult<Json<Value>> {
    let activists = repo.list_activists_basic().await?;
    Ok(Json(json!({ "status": "success", "activists": activists })))
}

/// list_activist_range
///
/// [Organizer Route] One page of activists ordered by name, starting after
/// `after_name`. Used by the infinite-scroll list.
#[utoipa::path(
    post,
    path = "/activist/list_range",
    request_body = ActivistRange,
    responses((status = 200, description = "{status, activist_range_list}"))
)]
pub async fn list_activist_range(
    State(repo): State<RepositoryState>,
    payload: Result<Json<ActivistRange>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(range) = payload?;
    let activists = repo.list_activist_range(&range).await?;
    Ok(Json(json!({ "status": "success", "activist_range_list": activists })))
}

/// save_activist
///
/// [Organizer Route] Creates (`id == 0`) or updates an activist and returns the stored
/// record.
#[utoipa::path(
    post,
    path = "/activist/save",
    request_body = ActivistInput,
    responses((status = 200, description = "{status, activist}"))
)]
pub async fn save_activist(
    State(repo): State<RepositoryState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ActivistInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(input) = payload?;
    let input = input.cleaned().map_err(AppError::Validation)?;
    let is_new = input.id == 0;

    let activist = repo.save_activist(input).await?;
    tracing::info!(activist_id = activist.id, is_new, by = %user.email, "activist saved");
    Ok(Json(json!({ "status": "success", "activist": activist })))
}

#[utoipa::path(
    post,
    path = "/activist/hide",
    request_body = HideActivistRequest,
    responses((status = 200, description = "{status}"))
)]
pub async fn hide_activist(
    State(repo): State<RepositoryState>,
    payload: Result<Json<HideActivistRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    repo.hide_activist(request.id).await?;
    tracing::info!(activist_id = request.id, "activist hidden");
    Ok(success())
}

/// merge_activist
///
/// [Organizer Route] Folds the current activist into the one named by
/// `target_activist_name`: attendance and memberships move over and the current
/// record is deleted.
#[utoipa::path(
    post,
    path = "/activist/merge",
    request_body = MergeActivistRequest,
    responses((status = 200, description = "{status}"))
)]
pub async fn merge_activist(
    State(repo): State<RepositoryState>,
    payload: Result<Json<MergeActivistRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload?;
    let target = request.target_activist_name.trim();
    if target.is_empty() {
        return Err(AppError::validation("Target activist name cannot be empty"));
    }

    repo.merge_activist(request.current_activist_id, target).await?;
    tracing::info!(
        activist_id = request.current_activist_id,
        target = %target,
        "activist merged"
    );
    Ok(success())
}
