//! Data-plane pass-through proxy.
//!
//! # Responsibilities
//! - Accept calls over HTTP/1.1 or h2c on the proxy listener
//! - Forward each call to a backend chosen by the balancer
//! - Measure every attempt through the call interceptor
//!
//! # Design Decisions
//! - The request path is the method label (`/pkg.Service/Method` for gRPC)
//! - Request bodies are buffered so a retry can replay them
//! - The response body streams back unbuffered; the attempt is measured
//!   up to the response head

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::client::BalancedClient;
use crate::config::ProxyConfig;
use crate::error::NoHealthyBackend;
use crate::interceptor::ErrorClass;
use crate::lifecycle::shutdown;

/// Connection-scoped headers that must not cross the proxy. `te` is kept:
/// gRPC requires `te: trailers` end to end.
const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Why a forwarded attempt failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    NoHealthyBackend(#[from] NoHealthyBackend),

    #[error("could not build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

impl ErrorClass for ForwardError {
    fn error_type(&self) -> Cow<'static, str> {
        match self {
            ForwardError::NoHealthyBackend(e) => e.error_type(),
            ForwardError::Request(_) => Cow::Borrowed("InvalidRequest"),
            ForwardError::Upstream(e) if e.is_connect() => Cow::Borrowed("Unavailable"),
            ForwardError::Upstream(_) => Cow::Borrowed("Upstream"),
            ForwardError::Timeout(_) => Cow::Borrowed("DeadlineExceeded"),
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = match &self {
            ForwardError::NoHealthyBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
            ForwardError::Request(_) | ForwardError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, self.to_string()).into_response()
    }
}

struct ProxyState {
    client: BalancedClient,
    upstream: Client<HttpConnector, Body>,
    timeout: Duration,
    max_body_bytes: usize,
}

/// Listener that forwards every inbound call to a balanced backend.
pub struct ProxyServer {
    router: Router,
}

impl ProxyServer {
    pub fn new(client: BalancedClient, config: &ProxyConfig) -> Self {
        let upstream = Client::builder(TokioExecutor::new())
            .http2_only(config.http2_only)
            .build_http();

        let state = Arc::new(ProxyState {
            client,
            upstream,
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_body_bytes: config.max_body_bytes,
        });

        let router = Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Proxy listener starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("Proxy listener stopped");
        Ok(())
    }
}

async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Rejecting request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let method = parts.uri.path().to_string();
    let state_ref = state.as_ref();
    let parts_ref = &parts;

    let result = state
        .client
        .call(&method, move |address| {
            forward(state_ref, address, parts_ref, body.clone())
        })
        .await;

    match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(method = %method, error = %e, "Call failed");
            e.into_response()
        }
    }
}

/// One attempt against `address`.
async fn forward(
    state: &ProxyState,
    address: String,
    parts: &Parts,
    body: Bytes,
) -> Result<Response, ForwardError> {
    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);

    let mut request = axum::http::Request::builder()
        .method(parts.method.clone())
        .uri(format!("http://{address}{path_and_query}"))
        .body(Body::from(body))?;
    *request.headers_mut() = headers;

    tracing::debug!(backend = %address, path = %path_and_query, "Forwarding call");

    let response = tokio::time::timeout(state.timeout, state.upstream.request(request))
        .await
        .map_err(|_| ForwardError::Timeout(state.timeout))??;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
