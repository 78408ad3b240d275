use std::{error::Error, net::SocketAddr, sync::Arc};

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Server,
};
use task_lists::{
    auth::build_identity, config::AppConfig, repo::SqliteUserRepository, route::create_router,
    store::TaskListStore, AppState,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Entry point of the application
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,task_lists=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, auth = ?config.auth, "configuration loaded");

    // Connect to the database and make sure the users table exists
    let repo = SqliteUserRepository::connect(&config.database_url).await?;
    repo.init().await?;

    let (verifier, cognito) = build_identity(&config.auth).await?;

    // Create an Arc-wrapped instance of the application state
    let app_state = Arc::new(AppState {
        store: TaskListStore::new(repo, config.max_write_attempts),
        verifier,
        cognito,
    });

    // Configure CORS settings for the application
    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let app = create_router(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(%addr, "server started successfully");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.store.repository().close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
