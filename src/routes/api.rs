use crate::{
    AppState,
    handlers::{activists, chapters, events, groups, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Attendance API
///
/// What the event form needs: autocompletion and event CRUD.
pub fn attendance_api() -> Router<AppState> {
    Router::new()
        .route("/activist_names/get", get(activists::activist_names))
        .route(
            "/activist_names/get_organizers",
            get(activists::organizer_names),
        )
        .route("/activist/list_basic", get(activists::list_activists_basic))
        .route("/event/get/{id}", get(events::get_event))
        // POST /event/save
        // Creates or updates an event and applies the attendee diff in one transaction.
        .route("/event/save", post(events::save_event))
        // POST /event/list (form)
        .route("/event/list", post(events::list_events))
        .route("/event/delete", post(events::delete_event))
}

/// Organizer API
///
/// Connections, the activist directory, working groups and circles.
pub fn organizer_api() -> Router<AppState> {
    Router::new()
        .route("/connection/save", post(events::save_connection))
        // --- Activists ---
        .route("/activist/list", post(activists::list_activists))
        // Keyset pagination by name for the infinite-scroll list.
        .route("/activist/list_range", post(activists::list_activist_range))
        .route("/activist/save", post(activists::save_activist))
        .route("/activist/hide", post(activists::hide_activist))
        // Folds the current activist into the target named in the body.
        .route("/activist/merge", post(activists::merge_activist))
        // --- Working groups & circles ---
        .route("/working_group/save", post(groups::save_working_group))
        .route("/working_group/list", post(groups::list_working_groups))
        .route("/working_group/delete", post(groups::delete_working_group))
        .route("/circle/save", post(groups::save_circle))
        .route("/circle/list", post(groups::list_circles))
        .route("/circle/delete", post(groups::delete_circle))
}

/// Admin API
///
/// User and role management plus the chapter editor's form targets.
pub fn admin_api() -> Router<AppState> {
    Router::new()
        .route("/user/list", get(users::list_users))
        .route("/user/save", post(users::save_user))
        .route("/user/delete", post(users::delete_user))
        .route("/users-roles/add", post(users::add_user_role))
        .route("/users-roles/remove", post(users::remove_user_role))
        // The chapter editor posts plain forms and is redirected back to /list_chapters.
        .route("/chapter/insert", post(chapters::insert_chapter))
        .route("/chapter/update", post(chapters::update_chapter))
        .route("/chapter/delete", get(chapters::delete_chapter))
}
