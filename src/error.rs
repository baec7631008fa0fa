// src/error.rs
use thiserror::Error;

/// Errors that can occur while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no label selector has been provided; set VAULT_LABEL_SELECTOR")]
    MissingLabelSelector,
}

/// Errors constructing a Backend from an orchestrator-reported pod address.
///
/// The address is untrusted input (whatever the orchestrator's pod-list
/// response contains), so a malformed value is recoverable: the Reconciler
/// logs and skips it rather than unwrapping.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{address:?} is not a valid backend address: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors surfaced by a single discovery tick.
///
/// These are logged and the tick is abandoned; they never reach `main`.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("orchestrator pod list call failed: {0}")]
    ListPods(#[source] kube::Error),

    #[error("could not resolve the current namespace: {0}")]
    Namespace(#[source] kube::Error),
}

/// Errors that can occur while forwarding a single request to a backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("transport error talking to backend: {0}")]
    Transport(#[source] hyper::Error),

    #[error("failed to build outbound request: {0}")]
    Build(#[source] hyper::http::Error),
}

/// Fatal startup errors; any of these abort the process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind listen socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to initialize orchestrator client: {0}")]
    Orchestrator(#[source] kube::Error),
}
