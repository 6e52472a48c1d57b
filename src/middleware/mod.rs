//! Middleware layer.
//!
//! A middleware is a plain function from handler to handler:
//!
//! ```text
//! fn(BoxedHandler) -> BoxedHandler
//! ```
//!
//! It receives the handler it guards and returns a new one with the same
//! signature. There is no global registry; a [`Pipeline`] is an explicit,
//! ordered list of such functions applied once at startup.
//!
//! Built-in middleware:
//! - [`recover_panic`] — turns a panicking handler into a `500` JSON response

mod recover;

use std::sync::Arc;

use crate::handler::BoxedHandler;

pub use recover::{recover_panic, RecoveredPanic};

/// A handler-to-handler wrapping function.
pub type Middleware = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static>;

/// Ordered middleware stack.
///
/// The first layer added is the outermost: it sees the request first and
/// the response last.
///
/// ```rust
/// use greenlight::middleware::{self, Pipeline};
/// use greenlight::{Request, Router};
///
/// # async fn healthcheck(_: Request) -> &'static str { "ok" }
/// let router = Router::new().get("/v1/healthcheck", healthcheck);
/// let app = Pipeline::new()
///     .layer(middleware::recover_panic)
///     .wrap(router.into_handler());
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    layers: Vec<Middleware>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer inside every layer added before it.
    pub fn layer<F>(mut self, middleware: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wraps `handler` in every layer, innermost first.
    pub fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        self.layers
            .iter()
            .rev()
            .fold(handler, |inner, middleware| middleware(inner))
    }
}
