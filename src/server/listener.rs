//! Listener implementation.
//!
//! Accepts incoming connections and serves HTTP/1.1, handing every request
//! to the dispatcher.

use crate::proxy::Dispatcher;
use crate::util::ConnectionId;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Listener that accepts and handles client connections.
pub struct Listener {
    /// Configured listen address.
    listen: SocketAddr,
    /// TCP listener.
    listener: TcpListener,
    /// Dispatcher handling every request.
    dispatcher: Arc<Dispatcher>,
}

impl Listener {
    /// Bind the listener.
    pub async fn bind(listen: SocketAddr, dispatcher: Arc<Dispatcher>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(listen).await?;

        info!(listen = %listen, "listener bound");

        Ok(Self {
            listen,
            listener,
            dispatcher,
        })
    }

    /// The address actually bound (differs from the configured one when the
    /// configured port is 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener, accepting connections until shutdown.
    #[instrument(skip_all, fields(listen = %self.listen))]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("listener starting");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("listener shutting down");
                    break;
                }
            }
        }
    }

    /// Handle an incoming connection.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let conn_id = ConnectionId::next();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let io = TokioIo::new(stream);

            let svc_conn_id = conn_id.clone();
            let service = service_fn(move |req| {
                let dispatcher = Arc::clone(&dispatcher);
                let conn_id = svc_conn_id.clone();
                async move { dispatcher.dispatch(req, client_addr, conn_id).await }
            });

            let result = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await;

            let duration = start_time.elapsed();

            if let Err(e) = result {
                warn!(
                    client = %client_addr,
                    connection_id = %conn_id,
                    duration_ms = duration.as_millis(),
                    error = %e,
                    "connection handling failed"
                );
            } else {
                debug!(
                    client = %client_addr,
                    connection_id = %conn_id,
                    duration_ms = duration.as_millis(),
                    "connection completed"
                );
            }
        });
    }
}
