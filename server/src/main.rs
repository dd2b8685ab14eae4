use tracing::info;
use tracing_subscriber::EnvFilter;

mod components;
mod errors;
mod oauth;
mod routes;
mod state;
mod static_assets;
mod tokens;

use state::AppState;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Create and run the tokio runtime
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(async { run_application().await })
}

async fn run_application() -> color_eyre::Result<()> {
    setup_tracing();

    info!("Starting Fyers OAuth Integration server");

    let app_state = AppState::from_env().await?;
    info!("APP_ID: {}", app_state.config.masked_app_id());
    info!("REDIRECT_URI: {}", app_state.config.redirect_uri);

    let addr = app_state.config.listen_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, routes::routes(app_state)).await?;

    Ok(())
}

/// Log to stderr, filtered by RUST_LOG with an `info` default.
fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
