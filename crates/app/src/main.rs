mod auth;
mod respond;
mod router;
mod service;
mod telemetry;

use std::net::SocketAddr;

use reqwest::Client;
use tracing::info;
use url::Url;

use strata_client::ReferenceApi;
use strata_storage::Database;
use strata_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;

    // The config value has no trailing slash; Url::join needs one to keep
    // any base path intact.
    let reference_base = Url::parse(&format!("{}/", config.reference_api_url))?;
    let reference = ReferenceApi::new(reference_base, Client::builder().build()?);

    let state = router::AppState::new(metrics, database, reference, config.environment);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
