// src/main.rs

use std::{net::SocketAddr, sync::Arc};

use quiz_backend::{
    config::Config,
    routes,
    state::AppState,
    supabase::{AuthClient, RestStore, http_client},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // One HTTP client shared by the store and the auth API
    let client = http_client(config.http_timeout_secs)?;
    let store = RestStore::new(&config.supabase_url, &config.supabase_key, client.clone());
    let auth = AuthClient::new(&config.supabase_url, &config.supabase_key, client);

    tracing::info!("Using backend at {}", config.supabase_url);

    let state = AppState {
        store: Arc::new(store),
        auth,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start the server
    axum::serve(listener, app).await?;

    Ok(())
}
