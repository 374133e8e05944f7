use std::sync::Arc;

use axum::Router;
use cleanup::Cleaner;
use config::Config;
use envconfig::Envconfig;
use eyre::Result;

use cleaner_common::metrics;
use cleaner_common::pgstore::PgStore;
use handlers::AdminToken;

mod cleanup;
mod config;
mod handlers;

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");
    if config.admin_token.trim().is_empty() {
        panic!("ADMIN_TOKEN must not be empty");
    }

    let tables = config
        .table_names()
        .expect("failed to build table names from configuration");
    let store = Arc::new(
        PgStore::new(&config.database_url, config.max_pg_connections, tables)
            .expect("failed to initialize job store"),
    );

    let cleaner = Cleaner::new(store.clone(), store);
    cleaner
        .initialize()
        .await
        .expect("failed to initialize job store tables");
    tracing::info!("job store ready, serving on {}", config.bind());

    let recorder_handle = metrics::setup_metrics_recorder();
    let app = handlers::app(
        cleaner,
        AdminToken::new(&config.admin_token),
        Some(recorder_handle),
    );

    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => tracing::error!("failed to start cleaner-janitor http server, {}", e),
    }
}
