use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, header},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pages;
pub mod repository;
pub mod session;

// Background jobs pushing ADB data to outside services.
pub mod sync;

// Routing, grouped by guard.
pub mod routes;
use routes::{api, discord, pages as page_routes, public};

// --- Public Re-exports ---

pub use clients::{DiscordState, GeolocatorState, MailerState, VerifierState};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
/// Page routes render HTML and are left out.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::session::token_sign_in,
        handlers::events::get_event, handlers::events::save_event,
        handlers::events::save_connection, handlers::events::list_events,
        handlers::events::delete_event,
        handlers::activists::activist_names, handlers::activists::organizer_names,
        handlers::activists::list_activists, handlers::activists::list_activists_basic,
        handlers::activists::list_activist_range, handlers::activists::save_activist,
        handlers::activists::hide_activist, handlers::activists::merge_activist,
        handlers::groups::save_working_group, handlers::groups::list_working_groups,
        handlers::groups::delete_working_group, handlers::groups::save_circle,
        handlers::groups::list_circles, handlers::groups::delete_circle,
        handlers::users::list_users, handlers::users::save_user, handlers::users::delete_user,
        handlers::users::add_user_role, handlers::users::remove_user_role,
        handlers::public::list_fb_events, handlers::public::find_nearest_chapters,
        handlers::public::list_fb_pages, handlers::public::list_chapters,
        handlers::discord::discord_status, handlers::discord::discord_generate,
    ),
    components(
        schemas(
            models::Role, models::AdbUser, models::UserInput, models::UserRoleRequest,
            models::Activist, models::ActivistListItem, models::ActivistBasic,
            models::ActivistInput, models::ActivistFilter, models::ActivistRange,
            models::HideActivistRequest, models::MergeActivistRequest,
            models::Event, models::EventInput, models::EventListForm, models::EventDeleteForm,
            models::GroupKind, models::GroupMember, models::Group, models::GroupInput,
            models::WorkingGroupDeleteRequest, models::CircleDeleteRequest,
            models::Chapter, models::ChapterPublic, models::FacebookEvent,
            models::DiscordStatus, handlers::session::TokenSignInForm,
        )
    ),
    tags(
        (name = "adb", description = "Activist Database API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request handler can reach. Optional integrations are `None` when
/// their configuration is absent; handlers degrade instead of failing.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    /// Google ID token verification for `/tokensignin`.
    pub verifier: VerifierState,
    /// SES, used for Discord confirmation emails.
    pub mailer: Option<MailerState>,
    pub discord: Option<DiscordState>,
    pub geolocator: Option<GeolocatorState>,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// `/static` and `/dist` from disk. Outside production responses are marked
/// uncacheable so rebuilt bundles show up on reload.
fn static_files(is_prod: bool) -> Router<AppState> {
    let router = Router::new()
        .nest_service("/static", ServeDir::new("static"))
        .nest_service("/dist", ServeDir::new("dist"));
    if is_prod {
        return router;
    }
    router.layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static(NO_CACHE),
    ))
}

/// create_router
///
/// Assembles every route group behind its guard, then wraps the whole app in the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let guarded = Router::new()
        // --- Pages ---
        .merge(page_routes::attendance_pages().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::attendance_page,
        )))
        .merge(page_routes::organizer_pages().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::organizer_page,
        )))
        .merge(page_routes::admin_pages().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_page,
        )))
        // --- JSON API ---
        .merge(api::attendance_api().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::attendance_api,
        )))
        .merge(api::organizer_api().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::organizer_api,
        )))
        .merge(api::admin_api().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_api,
        )));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(discord::discord_routes())
        .merge(guarded)
        .merge(static_files(state.config.is_prod()))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with the `x-request-id` set by the layer above it.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
