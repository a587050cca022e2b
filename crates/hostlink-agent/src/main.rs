mod api;
mod coordinator;
mod handshake;

use anyhow::Context;
use coordinator::LoggingDisableCoordinator;
use handshake::PassthroughHandshake;
use hostlink_config::AgentConfig;
use hostlink_runtime::{HostLink, LinkSettings, NoopAllowance, TcpHostClient};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => hostlink_config::load_config::<AgentConfig>(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => AgentConfig::default(),
    };

    // Initialize logging
    hostlink_logging::init_with_level(&config.log_level);

    // Register metrics
    hostlink_metrics::register_metrics();

    info!(
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
        links = config.links.len(),
        "Starting host link agent"
    );

    let coordinator = Arc::new(LoggingDisableCoordinator::default());
    let (external, _) = broadcast::channel(16);

    let mut links = Vec::with_capacity(config.links.len());
    for link_config in &config.links {
        let client = Arc::new(TcpHostClient::new(
            link_config.host.clone(),
            link_config.port,
            link_config.connect_timeout(),
        ));
        let settings = LinkSettings {
            no_message_timeout: link_config.no_message_timeout(),
            retry_delay: link_config.retry_delay(),
        };

        let link = HostLink::spawn(
            link_config.name.clone(),
            settings,
            client,
            Arc::new(PassthroughHandshake::new(link_config.name.clone())),
            coordinator.clone(),
            Arc::new(NoopAllowance),
        );
        let _ = link.attach_event_source(external.subscribe());

        let state = link.start().await?;
        info!(link = %link.name(), host = %link_config.host, port = link_config.port, %state, "Host link started");
        links.push(link);
    }

    let app_state = Arc::new(api::AppState {
        links: links.clone(),
        coordinator: coordinator.clone(),
        external,
    });
    let app = api::create_router(app_state);

    let addr = format!("0.0.0.0:{}", config.metrics_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Operator API listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Operator API stopped");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down host link agent");

    for link in &links {
        if let Err(e) = link.stop().await {
            error!(link = %link.name(), error = %e, "Failed to stop host link");
        }
        if let Err(e) = link.shutdown().await {
            error!(link = %link.name(), error = %e, "Host link did not shut down cleanly");
        }
    }

    if coordinator.is_disabled() {
        info!(active = coordinator.snapshot().len(), "Disables still held at exit");
    }

    Ok(())
}
