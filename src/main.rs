//! picast server binary
//!
//! Binds the web server, wires the control plane together, and stops any
//! active capture session on ctrl-c before exiting.

use std::sync::Arc;

use picast::{
    BackendSelector, BroadcastHub, CaptureSupervisor, Selector, ServerConfig, StartOptions,
    StreamController, StreamServer, SupervisorConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picast=info,tower_http=warn".into()),
        )
        .init();

    tracing::info!("Starting picast v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();

    let hub = Arc::new(BroadcastHub::new());
    let selector: Arc<dyn Selector> = Arc::new(BackendSelector::new());
    let supervisor = Arc::new(CaptureSupervisor::new(
        Arc::clone(&hub),
        Arc::clone(&selector),
        SupervisorConfig::default(),
    ));
    let controller = Arc::new(StreamController::new(hub, supervisor, Arc::clone(&selector)));

    // Startup probe is informational only; capture starts with the first viewer
    match selector.select(StartOptions::default()) {
        Ok(backend) => tracing::info!(backend = %backend.kind, "Camera detected"),
        Err(e) => tracing::warn!(error = %e, "No camera detected yet, will probe when a viewer connects"),
    }

    let server = StreamServer::new(config, Arc::clone(&controller));
    tracing::info!(addr = %server.bind_addr(), "Viewer page at http://<device-ip>:{}", server.bind_addr().port());

    let shutdown = {
        let controller = Arc::clone(&controller);
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
            controller.request_stop().await;
        }
    };

    server.run_until(shutdown).await?;

    Ok(())
}
