//! Forwarding a single HTTP request to a backend.
//!
//! A transport-level failure here (connect, handshake, send) is the only
//! condition that ever changes a backend's liveness; an HTTP error status
//! from the backend is a normal response and is relayed untouched.

use crate::pool::Backend;
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Forwarding error. Every variant is a transport-level failure.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to connect to backend {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("connection timeout to backend {0}")]
    ConnectTimeout(String),

    #[error("backend handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("failed to send request to backend: {0}")]
    Send(#[source] hyper::Error),
}

/// Forward one request to the given backend.
///
/// The request is rebuilt from the buffered parts and body so the caller can
/// replay it against another backend if this one fails. The backend's
/// response is returned as-is; status and headers are not inspected.
#[instrument(skip_all, fields(backend = %backend.url()))]
pub async fn forward(
    backend: &Backend,
    parts: &Parts,
    body: Bytes,
    connect_timeout: Duration,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, ForwardError> {
    let stream = connect_to_backend(backend, connect_timeout).await?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(ForwardError::Handshake)?;

    // Drive the connection to completion in the background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!(error = %e, "backend connection error");
        }
    });

    // The outbound URI must be relative: the backend's base address plus the
    // original path and query
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut req = Request::new(Full::new(body));
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = path_and_query
        .parse()
        .unwrap_or_else(|_| Uri::from_static("/"));
    *req.headers_mut() = parts.headers.clone();

    let response = sender.send_request(req).await.map_err(ForwardError::Send)?;

    Ok(response.map(|body| body.boxed()))
}

/// Connect to a backend with timeout.
async fn connect_to_backend(
    backend: &Backend,
    connect_timeout: Duration,
) -> Result<TcpStream, ForwardError> {
    debug!("connecting to backend");

    match timeout(connect_timeout, TcpStream::connect(backend.addr())).await {
        Ok(Ok(stream)) => {
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(e)) => Err(ForwardError::Connect {
            addr: backend.addr().to_string(),
            source: e,
        }),
        Err(_) => Err(ForwardError::ConnectTimeout(backend.addr().to_string())),
    }
}

/// Create a plain-text error response.
pub(crate) fn error_response(
    status: StatusCode,
    message: &str,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let body = Full::new(Bytes::from(format!("{}: {}\n", status, message)))
        .map_err(|never| match never {})
        .boxed();

    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(body)
        .unwrap()
}
