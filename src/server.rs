//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! # Failure isolation
//!
//! Every connection runs on its own tokio task and every request is one
//! call into the application handler. Wrap the application in
//! [`recover_panic`](crate::middleware::recover_panic) so a panicking handler
//! answers `500` instead of tearing the connection down.
//!
//! # Request bodies
//!
//! Bodies are read fully into memory before the handler runs, up to
//! [`DEFAULT_MAX_BODY_BYTES`] unless [`Server::max_body_bytes`] says
//! otherwise. Larger bodies are answered with `413` and never reach the
//! handler. A reverse proxy in front may enforce a tighter limit
//! (`client_max_body_size` in nginx); this one holds either way.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::responses;

/// Request bodies larger than this are rejected with `413` (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    max_body_bytes: usize,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use greenlight::Server;
    /// let server = Server::bind("0.0.0.0:4000").unwrap();
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let parsed = addr.parse::<SocketAddr>().map_err(|source| Error::InvalidAddr {
            addr: addr.to_owned(),
            source,
        })?;
        Ok(Self { addr: parsed, max_body_bytes: DEFAULT_MAX_BODY_BYTES })
    }

    /// Caps request bodies at `limit` bytes.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts accepting connections and dispatching them to `app`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, app: BoxedHandler) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        run(listener, app, self.max_body_bytes, shutdown_signal()).await
    }

    /// Serves `app` on an already-bound `listener` instead of the configured
    /// address, until `shutdown` resolves.
    pub async fn serve_on<S>(
        self,
        listener: TcpListener,
        app: BoxedHandler,
        shutdown: S,
    ) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        run(listener, app, self.max_body_bytes, shutdown).await
    }
}

/// Serves `app` on an already-bound `listener` until `shutdown` resolves,
/// then drains in-flight connections. Bodies are capped at
/// [`DEFAULT_MAX_BODY_BYTES`].
pub async fn serve_with_shutdown<S>(
    listener: TcpListener,
    app: BoxedHandler,
    shutdown: S,
) -> Result<(), Error>
where
    S: Future<Output = ()>,
{
    run(listener, app, DEFAULT_MAX_BODY_BYTES, shutdown).await
}

async fn run<S>(
    listener: TcpListener,
    app: BoxedHandler,
    max_body_bytes: usize,
    shutdown: S,
) -> Result<(), Error>
where
    S: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "starting server");

    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Check shutdown first so a signal stops accepting immediately,
            // even if more connections are queued.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let app = Arc::clone(&app);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let app = Arc::clone(&app);
                        async move { dispatch(app, req, max_body_bytes).await }
                    });

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("connection task failed: {e}");
                }
            }
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("stopped server");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads one request body, at most `max_body_bytes` of it, and hands the
/// request to `app`.
///
/// The error type is [`Infallible`](std::convert::Infallible): every failure
/// is answered with a response, so hyper never sees an error.
async fn dispatch(
    app: BoxedHandler,
    req: hyper::Request<hyper::body::Incoming>,
    max_body_bytes: usize,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let body = match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            info!(request_method = %parts.method, request_url = %parts.uri.path(), limit = max_body_bytes, "request body too large");
            return Ok(responses::body_too_large(max_body_bytes).into_inner());
        }
        Err(e) => {
            error!(request_method = %parts.method, request_url = %parts.uri.path(), "failed to read request body: {e}");
            return Ok(responses::bad_request("the request body could not be read").into_inner());
        }
    };

    let response = app.call(Request::from_parts(parts, body)).await;
    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C) the process receives.
///
/// If a signal handler cannot be installed that arm never resolves and the
/// failure is logged; the other signal still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
