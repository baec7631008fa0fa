// src/dispatch/handler.rs
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use hyper::body::HttpBody;
use hyper::{Body, Request, Response, StatusCode};
use tokio::time::sleep;
use tower::Service;
use tracing::warn;
use uuid::Uuid;

use crate::dispatch::context::RequestContext;
use crate::pool::Pool;

const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(5);
const SERVICE_UNAVAILABLE_BODY: &str = "Service not available";
const BAD_REQUEST_BODY: &str = "Bad request";

/// Largest inbound request body this proxy will buffer before forwarding.
/// Matches Vault's own default `max_request_size` (32 MiB) so a well-formed
/// API client is never rejected here before Vault itself would reject it.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Why buffering the inbound body failed, distinguishing an over-limit body
/// (client error, 400) from a transport failure reading it (also 400: the
/// Dispatcher's only documented 503 reasons are "no live Backend" and
/// "failover budget exhausted", and a broken read is neither).
enum BodyReadError {
    TooLarge,
    Transport(hyper::Error),
}

/// Reads `body` into memory, rejecting anything over [`MAX_BODY_BYTES`].
///
/// Checks the `Content-Length`-derived size hint first as a cheap fast path,
/// then enforces the cap against the true accumulated byte count as the
/// request streams in, since a chunked request carries no trustworthy
/// upfront length.
async fn read_body_bounded(mut body: Body) -> Result<Bytes, BodyReadError> {
    if let Some(upper) = body.size_hint().upper() {
        if upper > MAX_BODY_BYTES as u64 {
            return Err(BodyReadError::TooLarge);
        }
    }

    let mut collected = BytesMut::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(BodyReadError::Transport)?;
        if collected.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(BodyReadError::TooLarge);
        }
        collected.extend_from_slice(&chunk);
    }
    Ok(collected.freeze())
}

fn service_unavailable() -> Response<Body> {
    Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .body(Body::from(SERVICE_UNAVAILABLE_BODY))
        .expect("building a static 503 response never fails")
}

fn bad_request(reason: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Body::from(format!("{BAD_REQUEST_BODY}: {reason}")))
        .expect("building a static 400 response never fails")
}

fn clone_request(parts: &hyper::http::request::Parts, body: &Bytes) -> Request<Body> {
    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .version(parts.version);
    *builder.headers_mut().expect("builder in valid state") = parts.headers.clone();
    builder
        .body(Body::from(body.clone()))
        .expect("rebuilding a request from captured parts never fails")
}

/// Entry point for every inbound HTTP request: selects a Backend, forwards,
/// and runs the per-request retry/failover cycle on transport error.
///
/// The inbound body is buffered once so the same bytes can be resent across
/// same-backend retries and cross-backend failovers. A UUID is generated per
/// request so its whole retry/failover sequence can be correlated in logs.
pub async fn dispatch(pool: &Pool, req: Request<Body>) -> Response<Body> {
    let request_id = Uuid::new_v4();
    let (parts, body) = req.into_parts();
    let body_bytes = match read_body_bounded(body).await {
        Ok(bytes) => bytes,
        Err(BodyReadError::TooLarge) => {
            warn!(%request_id, limit = MAX_BODY_BYTES, "rejecting request with oversized body");
            return bad_request("request body exceeds maximum size");
        }
        Err(BodyReadError::Transport(err)) => {
            warn!(%request_id, error = %err, "failed to buffer inbound request body");
            return bad_request("failed to read request body");
        }
    };

    let mut ctx = RequestContext::default();

    loop {
        if ctx.attempts > MAX_ATTEMPTS {
            return service_unavailable();
        }

        let backend = match pool.pick_next().await {
            Some(backend) => backend,
            None => return service_unavailable(),
        };

        loop {
            let outbound = clone_request(&parts, &body_bytes);
            match backend.forward(outbound).await {
                Ok(response) => return response,
                Err(err) => {
                    warn!(
                        %request_id,
                        address = backend.address(),
                        retry = ctx.retry,
                        error = %err,
                        "forward failed"
                    );

                    if ctx.retry < MAX_RETRY {
                        sleep(RETRY_DELAY).await;
                        ctx.retry += 1;
                        continue;
                    }

                    pool.mark_status(backend.proxy_url().as_str(), false).await;
                    ctx.attempts += 1;
                    ctx.retry = 0;
                    break;
                }
            }
        }
    }
}

/// The `tower::Service` wired into the Hyper connection loop. Holds the
/// shared Pool and forwards every inbound request to [`dispatch`].
#[derive(Clone)]
pub struct RequestHandler {
    pool: Arc<Pool>,
}

impl RequestHandler {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let pool = self.pool.clone();
        Box::pin(async move { Ok(dispatch(&pool, req).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;

    #[tokio::test]
    async fn empty_pool_returns_503() {
        let pool = Pool::new();
        let req = Request::builder().body(Body::empty()).unwrap();
        let response = dispatch(&pool, req).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn all_dead_backends_returns_503() {
        let pool = Pool::new();
        let backend = Arc::new(Backend::new("10.0.0.1").unwrap());
        backend.set_alive(false).await;
        pool.add(backend).await;

        let req = Request::builder().body(Body::empty()).unwrap();
        let response = dispatch(&pool, req).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unreachable_backends_mark_not_alive_and_return_503() {
        // Nothing listens on 127.0.0.1:8200 in the test environment, so every
        // forward attempt fails transport-level (connection refused).
        let pool = Pool::new();
        pool.add(Arc::new(Backend::new("127.0.0.1").unwrap())).await;

        let req = Request::builder().body(Body::empty()).unwrap();
        let response = dispatch(&pool, req).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let backend = pool.snapshot().await.into_iter().next().unwrap();
        assert!(!backend.is_alive().await);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_with_400_not_503() {
        let pool = Pool::new();
        let oversized = vec![0u8; MAX_BODY_BYTES + 1];
        let req = Request::builder()
            .body(Body::from(oversized))
            .unwrap();

        let response = dispatch(&pool, req).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_within_limit_is_not_rejected() {
        // An empty Pool still returns 503, but only after the body buffered
        // successfully — distinguishing this from the oversized-body path.
        let pool = Pool::new();
        let req = Request::builder()
            .body(Body::from(vec![0u8; 1024]))
            .unwrap();

        let response = dispatch(&pool, req).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
