// src/reconciler.rs
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::Backend;
use crate::pool::Pool;

/// Diffs discovered addresses against Pool membership and constructs or
/// retires Backends accordingly.
///
/// Additions run before retirements within a tick, so the Pool never drops
/// to empty merely because all prior members are being replaced in the same
/// pass.
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    pub async fn reconcile(&self, discovered: &HashSet<String>, pool: &Pool) {
        for address in discovered {
            if !pool.contains(address).await {
                match Backend::new(address.clone()) {
                    Ok(backend) => {
                        info!(address = %address, "configuring new backend");
                        pool.add(Arc::new(backend)).await;
                    }
                    Err(err) => {
                        warn!(address = %address, error = %err, "skipping malformed backend address");
                    }
                }
            }
        }

        let existing: Vec<String> = pool
            .snapshot()
            .await
            .iter()
            .map(|b| b.address().to_string())
            .collect();

        for address in existing {
            if !discovered.contains(&address) {
                info!(address = %address, "retiring backend no longer discovered");
                pool.retire(&address).await;
            }
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
