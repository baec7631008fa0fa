// ────────────────────────────────
// src/server/listener.rs
// Encapsulates low‑level TCP bind/accept so we can swap TLS later.
// ────────────────────────────────
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::error::StartupError;

pub async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr).await.map_err(StartupError::Bind)
}
