use dotenvy::dotenv;
use school_ledger::{
    api::{self, AppState},
    config::{auth, database, settings},
    errors::Result,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load settings
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    info!(
        bind_addr = %settings.server.bind_addr,
        default_agency_fee = settings.fees.default_agency_fee,
        "Settings loaded"
    );

    // 4. Open the database and make sure the tables exist
    let database_url = database::get_database_url();
    database::ensure_sqlite_parent_dir(&database_url)?;
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    let admin_token = auth::get_admin_token();
    if admin_token.is_none() {
        warn!("ADMIN_TOKEN is not set; write routes are open");
    }

    // 5. Serve the API
    let bind_addr = settings.server.bind_addr.clone();
    let app = api::router(AppState::new(db, settings, admin_token)).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(bind_addr.as_str()).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
