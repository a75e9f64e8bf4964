use axum::{
    Form, Json,
    extract::{Path, State, rejection::FormRejection, rejection::JsonRejection},
};
use serde_json::{Value, json};

use crate::{
    error::{AppError, AppResult},
    handlers::success,
    models::{Event, EventDeleteForm, EventInput, EventListForm},
    repository::RepositoryState,
};

pub const CONNECTION_TYPE: &str = "Connection";

/// get_event
///
/// [Attendance Route] A single event with its attendee names.
#[utoipa::path(
    get,
    path = "/event/get/{id}",
    params(("id" = i32, Path, description = "Event id")),
    responses(
        (status = 200, description = "{status, event}", body = Event),
        (status = 400, description = "Not authenticated"),
        (status = 403, description = "Missing the attendance role")
    )
)]
pub async fn get_event(
    State(repo): State<RepositoryState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    let event = repo
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Event {} not found", id)))?;

    Ok(Json(json!({ "status": "success", "event": event })))
}

/// Validates and stores an event, then builds the save reply. New events redirect the
/// editor to `{redirect_base}/{id}`.
async fn save(
    repo: &RepositoryState,
    input: EventInput,
    redirect_base: &str,
) -> AppResult<Json<Value>> {
    let draft = input.validate().map_err(AppError::Validation)?;
    let is_new = draft.id == 0;

    let event = repo.save_event(draft).await?;
    tracing::info!(event_id = event.id, is_new, event_type = %event.event_type, "event saved");

    let redirect = if is_new {
        format!("{}/{}", redirect_base, event.id)
    } else {
        String::new()
    };

    Ok(Json(json!({
        "status": "success",
        "redirect": redirect,
        "attendees": event.attendees,
    })))
}

/// save_event
///
/// [Attendance Route] Creates (`event_id == 0`) or updates an event and applies the
/// attendee diff. Connections must go through `/connection/save`.
#[utoipa::path(
    post,
    path = "/event/save",
    request_body = EventInput,
    responses((status = 200, description = "{status, redirect, attendees}"))
)]
pub async fn save_event(
    State(repo): State<RepositoryState>,
    payload: Result<Json<EventInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(input) = payload?;
    if input.event_type.trim() == CONNECTION_TYPE {
        return Err(AppError::validation("Connections must be saved as connections"));
    }
    save(&repo, input, "/update_event").await
}

/// save_connection
///
/// [Organizer Route] Same as `save_event`, always stored with the Connection type.
#[utoipa::path(
    post,
    path = "/connection/save",
    request_body = EventInput,
    responses((status = 200, description = "{status, redirect, attendees}"))
)]
pub async fn save_connection(
    State(repo): State<RepositoryState>,
    payload: Result<Json<EventInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(mut input) = payload?;
    input.event_type = CONNECTION_TYPE.to_string();
    save(&repo, input, "/update_connection").await
}

/// list_events
///
/// [Attendance Route] Events matching the form filters, newest first. The
/// `noConnections` type lists every event except connections.
#[utoipa::path(
    post,
    path = "/event/list",
    request_body(content = EventListForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, description = "Array of events", body = Vec<Event>))
)]
pub async fn list_events(
    State(repo): State<RepositoryState>,
    form: Result<Form<EventListForm>, FormRejection>,
) -> AppResult<Json<Vec<Event>>> {
    let Form(form) = form?;
    let filter = form.into_filter().map_err(AppError::Validation)?;
    Ok(Json(repo.list_events(&filter).await?))
}

/// delete_event
///
/// [Attendance Route] Deletes an event and its attendance rows.
#[utoipa::path(
    post,
    path = "/event/delete",
    request_body(content = EventDeleteForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, description = "{status}"))
)]
pub async fn delete_event(
    State(repo): State<RepositoryState>,
    form: Result<Form<EventDeleteForm>, FormRejection>,
) -> AppResult<Json<Value>> {
    let Form(form) = form?;
    let id = form
        .event_id
        .trim()
        .parse::<i32>()
        .map_err(|_| AppError::validation(format!("Invalid event id: {:?}", form.event_id)))?;

    repo.delete_event(id).await?;
    tracing::info!(event_id = id, "event deleted");
    Ok(success())
}
