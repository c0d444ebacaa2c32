mod config;
mod db;
mod routes;

use std::sync::Arc;

use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_stash=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = Config::load_or_default("config.toml")?;
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        config.database_url = database_url;
    }

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let bind_addr = config.bind_addr.clone();

    // Create app state
    let state = Arc::new(AppState {
        db: Arc::new(db),
        config,
    });

    // Build router
    let app = routes::router(state).nest_service("/static", ServeDir::new("static"));

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server starting on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
