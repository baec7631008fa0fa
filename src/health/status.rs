// src/health/status.rs
use serde::Deserialize;

/// The JSON document returned by Vault's `/v1/sys/seal-status` endpoint.
///
/// Only `sealed` is read; every other field Vault returns (`type`,
/// `initialized`, `version`, `cluster_id`, `recovery_seal`, `storage_type`,
/// ...) is accepted but ignored, which serde does for free by not naming
/// them here.
#[derive(Debug, Deserialize)]
pub struct SealStatus {
    pub sealed: bool,
}
