// src/main.rs
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info};

use vault_balancer::config::Config;
use vault_balancer::discovery::{Discoverer, KubeOrchestratorClient, OrchestratorClient};
use vault_balancer::dispatch::RequestHandler;
use vault_balancer::error::StartupError;
use vault_balancer::health::HealthProber;
use vault_balancer::pool::Pool;
use vault_balancer::server::ServerBuilder;
use vault_balancer::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing. Structured JSON log lines, filterable via RUST_LOG.
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(StartupError::Config)?;

    let orchestrator = Arc::new(
        KubeOrchestratorClient::try_new()
            .await
            .map_err(StartupError::Orchestrator)?,
    );
    match orchestrator.cluster_version().await {
        Ok(version) => info!(
            version,
            namespace = orchestrator.namespace(),
            "connected to cluster"
        ),
        Err(err) => error!(error = %err, "could not resolve cluster version at startup"),
    }

    let pool = Arc::new(Pool::new());
    let discoverer = Discoverer::new(orchestrator);
    let prober = HealthProber::new(config.http_timeout);

    let supervisor = Arc::new(Supervisor::new(
        pool.clone(),
        discoverer,
        prober,
        config.label_selector.clone(),
    ));

    let supervisor_handle = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.run().await })
    };

    let handler = RequestHandler::new(pool);
    let addr: SocketAddr = ([0, 0, 0, 0], config.balancer_port).into();
    info!(%addr, "starting vault balancer");

    tokio::select! {
        result = ServerBuilder::new(addr).with_handler(handler).serve() => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("shutdown requested, stopping reconciliation loop");
            supervisor.shutdown();
            let _ = supervisor_handle.await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
