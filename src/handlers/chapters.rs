use axum::{
    Form,
    extract::{Query, State, rejection::FormRejection, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::ChapterForm,
    repository::RepositoryState,
    session,
};

const CHAPTER_LIST: &str = "/list_chapters";

/// 302 back to the chapter list, optionally carrying a success flash cookie.
fn back_to_list(flash: Option<&str>) -> Response {
    let mut response = (
        StatusCode::FOUND,
        [(header::LOCATION, HeaderValue::from_static(CHAPTER_LIST))],
    )
        .into_response();
    if let Some(cookie) = flash.and_then(session::flash_cookie) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// insert_chapter
///
/// [Admin Route] Creates a chapter from the editor form, then returns to the list.
pub async fn insert_chapter(
    State(repo): State<RepositoryState>,
    form: Result<Form<ChapterForm>, FormRejection>,
) -> AppResult<Response> {
    let Form(form) = form?;
    let chapter = form.into_chapter().map_err(AppError::Validation)?;

    let chapter_id = repo.insert_chapter(&chapter).await?;
    tracing::info!(chapter_id, page_id = chapter.id, "chapter created");
    Ok(back_to_list(Some("New chapter created.")))
}

/// update_chapter
///
/// [Admin Route] Saves the editor form over an existing chapter.
pub async fn update_chapter(
    State(repo): State<RepositoryState>,
    form: Result<Form<ChapterForm>, FormRejection>,
) -> AppResult<Response> {
    let Form(form) = form?;
    let chapter = form.into_chapter().map_err(AppError::Validation)?;
    if chapter.chapter_id == 0 {
        return Err(AppError::validation("Missing chapter id"));
    }

    repo.update_chapter(&chapter).await?;
    tracing::info!(chapter_id = chapter.chapter_id, "chapter updated");
    Ok(back_to_list(Some("Saved successfully.")))
}

#[derive(Debug, Deserialize)]
pub struct ChapterIdQuery {
    pub id: i32,
}

pub async fn delete_chapter(
    State(repo): State<RepositoryState>,
    query: Result<Query<ChapterIdQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    repo.delete_chapter(query.id).await?;
    tracing::info!(chapter_id = query.id, "chapter deleted");
    Ok(back_to_list(None))
}
