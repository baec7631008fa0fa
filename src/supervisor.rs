// src/supervisor.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::discovery::Discoverer;
use crate::health::HealthProber;
use crate::pool::Pool;
use crate::reconciler::Reconciler;

const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Owns the 10-second ticker and runs Discoverer -> Reconciler -> HealthProber
/// in sequence each tick. Within a tick the three phases run strictly
/// sequentially; between ticks, the same phase never overlaps itself.
pub struct Supervisor {
    pool: Arc<Pool>,
    discoverer: Discoverer,
    reconciler: Reconciler,
    prober: HealthProber,
    label_selector: String,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Supervisor {
    pub fn new(
        pool: Arc<Pool>,
        discoverer: Discoverer,
        prober: HealthProber,
        label_selector: String,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            pool,
            discoverer,
            reconciler: Reconciler::new(),
            prober,
            label_selector,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Signal the running loop to stop after its current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the reconciliation loop until `shutdown` is called.
    pub async fn run(&self) {
        let mut ticker = interval(TICK_INTERVAL);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(interval_secs = TICK_INTERVAL.as_secs(), "starting reconciliation loop");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reconciliation loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_tick(&self) {
        let discovered = match self.discoverer.discover(&self.label_selector).await {
            Ok(addresses) => addresses,
            Err(err) => {
                error!(error = %err, "discovery tick failed; retrying next tick");
                return;
            }
        };

        self.reconciler.reconcile(&discovered, &self.pool).await;
        self.prober.probe_all(&self.pool).await;
    }
}
