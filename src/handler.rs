//! Handler trait and type erasure.
//!
//! # How handlers are stored and wrapped
//!
//! The router keeps handlers of *different* concrete types in one table, and
//! middleware has to wrap any of them without knowing what is inside. Both
//! work on the same erased form, [`BoxedHandler`]:
//!
//! ```text
//! async fn show_movie(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/v1/movies/{id}", show_movie)
//! show_movie.into_boxed_handler()                     ← Handler blanket impl
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! recover_panic(router.into_handler())                ← middleware wraps it
//!        ↓
//! handler.call(req) at request time                   ← one vtable dispatch
//! ```
//!
//! A middleware is nothing more than a function `BoxedHandler -> BoxedHandler`
//! returning a new [`ErasedHandler`] that holds the inner one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Erased types ──────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` lets tokio move the future across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe request handler.
///
/// Implemented by wrapped `async fn`s, by [`Router`](crate::Router) and by
/// every middleware. Implement it directly only when writing a middleware.
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// function or closure with the shape:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Erases a handler so it can be passed to middleware or to
/// [`Server::serve`](crate::Server::serve) directly.
pub fn boxed(handler: impl Handler) -> BoxedHandler {
    handler.into_boxed_handler()
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        // The synchronous part of the call runs here, on the caller's stack.
        // Middleware that needs to observe it must guard `call` itself, not
        // only the returned future.
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
