use crate::{
    AppState,
    handlers::pages::{self, ACTIVIST_VIEWS},
};
use axum::{Router, routing::get};

/// Pages any staff role may open.
pub fn attendance_pages() -> Router<AppState> {
    Router::new()
        // The event form is the landing page.
        .route("/", get(pages::new_event))
        .route("/update_event/{id}", get(pages::update_event))
        .route("/list_events", get(pages::list_events))
}

/// Pages for organizers and admins: connections, activist lists and groups.
pub fn organizer_pages() -> Router<AppState> {
    let router = Router::new()
        .route("/new_connection", get(pages::new_connection))
        .route("/update_connection/{id}", get(pages::update_connection))
        .route("/list_connections", get(pages::list_connections))
        .route("/list_working_groups", get(pages::list_working_groups))
        .route("/list_circles", get(pages::list_circles));

    // Every activist list view shares one handler keyed on the path.
    ACTIVIST_VIEWS.iter().fold(router, |router, view| {
        router.route(view.path, get(pages::activist_list))
    })
}

pub fn admin_pages() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(pages::list_users))
        .route("/list_chapters", get(pages::list_chapters))
        // GET /chapter/edit?id=
        .route("/chapter/edit", get(pages::edit_chapter))
        .route("/chapter/new", get(pages::new_chapter))
}
