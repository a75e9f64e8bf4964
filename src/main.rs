use adb::{
    AppState,
    clients::{
        DiscordState, GeolocatorState, GoogleTokenVerifier, GraphClient, HttpDiscordClient,
        HttpSendyClient, IpGeolocationClient, MailerState, SendyState, SesMailer, VerifierState,
    },
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    sync::{
        SyncJob, SyncStoreState,
        facebook::FacebookEventSync,
        mailing_list::{MailingListSync, load_mailing_lists},
        sendy::SendySupporterSync,
        spawn_job,
        survey::SurveyMailer,
    },
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Starts every background job whose configuration is present.
fn start_sync_jobs(config: &AppConfig, store: SyncStoreState, mailer: Option<MailerState>) {
    let mut jobs: Vec<Arc<dyn SyncJob>> = Vec::new();

    match &config.sendy {
        Some(sendy) => {
            let client = Arc::new(HttpSendyClient::new(sendy)) as SendyState;
            jobs.push(Arc::new(SendySupporterSync::new(
                store.clone(),
                client.clone(),
                &sendy.lists,
            )));

            if let Some(path) = &config.mailing_lists_config_file {
                match load_mailing_lists(path) {
                    Ok(lists) => jobs.push(Arc::new(MailingListSync::new(
                        store.clone(),
                        client,
                        lists,
                    ))),
                    Err(e) => tracing::error!(%path, error = %e, "mailing list sync disabled"),
                }
            }
        }
        None => tracing::info!("sendy not configured; supporter and mailing list syncs disabled"),
    }

    match (&config.survey, mailer) {
        (Some(survey), Some(mailer)) => jobs.push(Arc::new(SurveyMailer::new(
            store.clone(),
            mailer,
            survey.clone(),
        ))),
        _ => tracing::info!("survey mailer disabled: needs survey settings and SES"),
    }

    let graph = Arc::new(GraphClient::new(&config.facebook_api_version));
    jobs.push(Arc::new(FacebookEventSync::new(store, graph)));

    for job in jobs {
        spawn_job(job);
    }
}

/// main
///
/// Entry point: configuration, logging, database and migrations, background jobs,
/// then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fails fast on missing required variables)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "adb=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");

    // One repository serves both the request handlers and the sync jobs.
    let postgres = Arc::new(PostgresRepository::new(pool));
    let repo = postgres.clone() as RepositoryState;
    let store = postgres as SyncStoreState;

    // 4. Outbound clients
    let mailer = config
        .ses
        .as_ref()
        .map(|ses| Arc::new(SesMailer::new(ses)) as MailerState);
    if mailer.is_none() {
        tracing::warn!("SES not configured; outgoing email is disabled");
    }

    let discord = match (&config.discord.bot_token, &config.discord.guild_id) {
        (Some(token), Some(guild)) => {
            Some(Arc::new(HttpDiscordClient::new(token, guild)) as DiscordState)
        }
        _ => None,
    };

    let geolocator = config
        .ipgeolocation_key
        .as_deref()
        .map(|key| Arc::new(IpGeolocationClient::new(key)) as GeolocatorState);

    let verifier = Arc::new(GoogleTokenVerifier::new(&config.google_client_id)) as VerifierState;

    // 5. Background jobs
    start_sync_jobs(&config, store, mailer.clone());

    // 6. HTTP server
    let port = config.port;
    let app_state = AppState {
        repo,
        config,
        verifier,
        mailer,
        discord,
        geolocator,
    };
    let app = create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", addr);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        port
    );

    // Connect info lets /fb_page fall back to the peer address for geolocation.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("FATAL: HTTP server error.");
}
