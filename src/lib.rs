//! # greenlight
//!
//! The HTTP core of a JSON API service: typed requests and responses, a
//! radix-tree router, a hyper-based server with graceful shutdown, and a
//! middleware layer whose centrepiece is per-request panic recovery.
//!
//! ## Failure isolation
//!
//! A handler that panics must not take the connection, or anything else,
//! down with it. [`middleware::recover_panic`] installs a recovery boundary
//! around each request: the panic is logged, the client receives
//!
//! ```text
//! HTTP/1.1 500 Internal Server Error
//! connection: close
//! content-type: application/json
//!
//! {"error":"the server encountered a problem and could not process your request"}
//! ```
//!
//! and every other request carries on as if nothing happened.
//!
//! ## Behind a proxy, or not
//!
//! TLS termination and rate limiting belong to the reverse proxy in front
//! (nginx, an ingress). Request bodies are the exception: they are buffered
//! in memory before the handler runs, so the server caps them itself
//! ([`DEFAULT_MAX_BODY_BYTES`], adjustable with [`Server::max_body_bytes`])
//! and answers `413` past the cap, whatever the proxy is configured to allow.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use greenlight::middleware::{self, Pipeline};
//! use greenlight::{health, responses, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), greenlight::Error> {
//!     let router = Router::new()
//!         .get("/v1/healthcheck", health::healthcheck("development", "1.0.0"))
//!         .get("/v1/movies/{id}", show_movie);
//!
//!     let app = Pipeline::new()
//!         .layer(middleware::recover_panic)
//!         .wrap(router.into_handler());
//!
//!     Server::bind("0.0.0.0:4000")?.serve(app).await
//! }
//!
//! async fn show_movie(req: Request) -> Response {
//!     match req.param("id").and_then(|id| id.parse::<u64>().ok()) {
//!         Some(id) => Response::json(format!(r#"{{"movie":{{"id":{id}}}}}"#)),
//!         None => responses::not_found(),
//!     }
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod health;
pub mod json;
pub mod middleware;
pub mod responses;
pub mod telemetry;

pub use error::Error;
pub use handler::{boxed, BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{serve_with_shutdown, Server, DEFAULT_MAX_BODY_BYTES};
