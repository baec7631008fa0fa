// src/backend.rs
use std::net::IpAddr;
use std::sync::Arc;

use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response};
use tokio::sync::RwLock;
use url::{Host, Url};

use crate::error::{BackendError, ForwardError};

/// Wraps `address` in `[...]` when it is an IPv6 literal, since the `http`
/// scheme's authority requires bracketed IPv6 hosts (`url::Url::parse`
/// rejects a bare `http://2001:db8::1:8200`).
fn bracketed_host(address: &str) -> String {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{address}]"),
        _ => address.to_string(),
    }
}

/// One replica's identity, liveness, target URLs, and forwarding handle.
///
/// A Backend's identity (`address`, `proxy_url`, `health_url`) is fixed at
/// construction. Only `alive` ever mutates, and it does so behind its own
/// reader-writer lock so health-check writes never serialize request
/// dispatch against an unrelated Backend.
pub struct Backend {
    /// The replica's network address (e.g. a pod IP), and its stable identity
    /// key within the Pool.
    address: String,
    proxy_url: Url,
    health_url: Url,
    alive: RwLock<bool>,
    client: Client<HttpConnector>,
}

impl Backend {
    /// Construct a Backend bound to `address`. The proxy URL is
    /// `http://<address>:8200`; the health-probe URL is the same host/port
    /// with path `/v1/sys/seal-status`.
    ///
    /// `address` is whatever the orchestrator reports as a pod IP, so it is
    /// untrusted input: a malformed address (or an unbracketed IPv6 literal)
    /// returns an error instead of panicking.
    pub fn new(address: impl Into<String>) -> Result<Self, BackendError> {
        let address = address.into();
        let host = bracketed_host(&address);

        let proxy_url = Url::parse(&format!("http://{host}:8200")).map_err(|source| {
            BackendError::InvalidAddress {
                address: address.clone(),
                source,
            }
        })?;
        let health_url = Url::parse(&format!("http://{host}:8200/v1/sys/seal-status")).map_err(
            |source| BackendError::InvalidAddress {
                address: address.clone(),
                source,
            },
        )?;

        Ok(Self {
            address,
            proxy_url,
            health_url,
            alive: RwLock::new(true),
            client: Client::new(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn proxy_url(&self) -> &Url {
        &self.proxy_url
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }

    pub async fn set_alive(&self, alive: bool) {
        *self.alive.write().await = alive;
    }

    pub async fn is_alive(&self) -> bool {
        *self.alive.read().await
    }

    /// Forward `req` to this backend, rewriting the scheme/authority to the
    /// proxy URL while preserving method, path, query, headers, and body.
    ///
    /// Any transport-level failure is returned rather than panicked so that
    /// the dispatcher's retry/failover loop can act on it.
    pub async fn forward(&self, req: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let host = match self.proxy_url.host() {
            Some(Host::Ipv6(addr)) => format!("[{addr}]"),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Domain(domain)) => domain.to_string(),
            None => self.address.clone(),
        };
        let outbound_uri = format!(
            "http://{}:{}{}",
            host,
            self.proxy_url.port_or_known_default().unwrap_or(8200),
            path_and_query
        );
        parts.uri = outbound_uri.parse().map_err(ForwardError::Build)?;

        let outbound = Request::from_parts(parts, body);
        self.client
            .request(outbound)
            .await
            .map_err(ForwardError::Transport)
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("address", &self.address)
            .field("proxy_url", &self.proxy_url.as_str())
            .finish()
    }
}

pub type SharedBackend = Arc<Backend>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_backend_builds_urls_from_address() {
        let backend = Backend::new("10.0.0.1").unwrap();
        assert_eq!(backend.address(), "10.0.0.1");
        assert_eq!(backend.proxy_url().as_str(), "http://10.0.0.1:8200/");
        assert_eq!(
            backend.health_url().as_str(),
            "http://10.0.0.1:8200/v1/sys/seal-status"
        );
    }

    #[tokio::test]
    async fn new_backend_brackets_ipv6_addresses() {
        let backend = Backend::new("2001:db8::1").unwrap();
        assert_eq!(backend.address(), "2001:db8::1");
        assert_eq!(
            backend.proxy_url().as_str(),
            "http://[2001:db8::1]:8200/"
        );
        assert_eq!(
            backend.health_url().as_str(),
            "http://[2001:db8::1]:8200/v1/sys/seal-status"
        );
    }

    #[tokio::test]
    async fn new_backend_starts_alive() {
        let backend = Backend::new("10.0.0.1").unwrap();
        assert!(backend.is_alive().await);
    }

    #[tokio::test]
    async fn set_alive_is_observed_by_is_alive() {
        let backend = Backend::new("10.0.0.1").unwrap();
        backend.set_alive(false).await;
        assert!(!backend.is_alive().await);
        backend.set_alive(true).await;
        assert!(backend.is_alive().await);
    }
}
