//! Per-request dispatch: select a backend, forward, react to failure.

use crate::pool::BackendPool;
use crate::proxy::forward::{error_response, forward};
use crate::util::{ConnectionId, RequestId};
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::Incoming;
use hyper::{HeaderMap, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Maps one inbound request to one forwarded request.
///
/// On a transport-level forwarding failure the selected backend is marked
/// dead and selection re-runs for the same request. The loop is capped at
/// the pool size: each failure permanently removes one backend from the
/// alive set, so within that many rounds either a response is produced or
/// no backend is left and the client gets 503.
pub struct Dispatcher {
    pool: Arc<BackendPool>,
    connect_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher over the given pool.
    pub fn new(pool: Arc<BackendPool>, connect_timeout: Duration) -> Self {
        Self {
            pool,
            connect_timeout,
        }
    }

    /// Handle a single inbound request.
    #[instrument(skip_all, fields(
        method = %req.method(),
        uri = %req.uri(),
        client = %client_addr
    ))]
    pub async fn dispatch(
        &self,
        req: Request<Incoming>,
        client_addr: SocketAddr,
        conn_id: ConnectionId,
    ) -> Result<Response<BoxBody<Bytes, hyper::Error>>, Infallible> {
        let start_time = Instant::now();
        let request_id = RequestId::new();

        let (mut parts, body) = req.into_parts();
        let method = parts.method.to_string();
        let uri = parts.uri.to_string();

        // Buffer the body once so the request can be replayed against
        // another backend after a transport failure
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(
                    connection_id = %conn_id,
                    request_id = %request_id,
                    error = %e,
                    "failed to read request body"
                );
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    "failed to read request body",
                ));
            }
        };

        apply_proxy_headers(&mut parts.headers, client_addr, &request_id);

        let rounds = self.pool.len();
        for _ in 0..rounds {
            let Some(backend) = self.pool.next_alive() else {
                break;
            };

            match forward(backend, &parts, body.clone(), self.connect_timeout).await {
                Ok(response) => {
                    let duration = start_time.elapsed();
                    info!(
                        connection_id = %conn_id,
                        request_id = %request_id,
                        method = %method,
                        uri = %uri,
                        backend = %backend.url(),
                        status = response.status().as_u16(),
                        duration_ms = duration.as_millis(),
                        "proxied request completed"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        connection_id = %conn_id,
                        request_id = %request_id,
                        backend = %backend.url(),
                        error = %e,
                        "forwarding failed, reselecting"
                    );
                    self.pool.mark_dead(backend.url());
                }
            }
        }

        warn!(
            connection_id = %conn_id,
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "no alive backend available"
        );

        Ok(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no backend available",
        ))
    }
}

/// Add the usual reverse-proxy request headers.
fn apply_proxy_headers(headers: &mut HeaderMap, client_addr: SocketAddr, request_id: &RequestId) {
    if let Ok(value) = client_addr.ip().to_string().parse() {
        headers.insert("x-forwarded-for", value);
    }

    if let Ok(value) = client_addr.ip().to_string().parse() {
        headers.insert("x-real-ip", value);
    }

    if let Ok(value) = request_id.as_str().parse() {
        headers.insert("x-request-id", value);
    }
}
