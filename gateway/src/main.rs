use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use crdp_gateway::{app, logging::init_logging, Settings};

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let settings = Settings::parse();
    init_logging(settings.log_json);

    let listener = TcpListener::bind(&settings.bind).await?;
    info!(
        addr = %settings.bind,
        crdp_host = %settings.crdp_api_host,
        crdp_port = settings.crdp_api_port,
        policy = %settings.crdp_protection_policy,
        "gateway listening"
    );
    axum::serve(listener, app(settings))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
