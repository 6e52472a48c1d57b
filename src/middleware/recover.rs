//! Per-request panic recovery.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use http::header::{HeaderValue, CONNECTION};

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;
use crate::responses;

/// A panic caught at the recovery boundary.
///
/// Only the message survives; it goes to the log and never to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredPanic {
    message: String,
}

impl RecoveredPanic {
    /// Renders a `catch_unwind` payload. `panic!` produces `&str` or
    /// `String`; anything else (`panic_any`) has no printable form.
    ///
    /// The payload is dropped inside its own unwind guard: a payload whose
    /// `Drop` panics must not escape the boundary that caught it.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        drop_payload(payload);
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn drop_payload(payload: Box<dyn Any + Send>) {
    if let Err(nested) = panic::catch_unwind(AssertUnwindSafe(move || drop(payload))) {
        // Dropping this one could panic again; leak it instead.
        std::mem::forget(nested);
    }
}

impl fmt::Display for RecoveredPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

/// Wraps `inner` so that a panic while handling one request becomes a
/// `500` response for that request alone.
///
/// On panic the response is
/// `{"error":"the server encountered a problem and could not process your request"}`
/// with `connection: close`, and the panic message is logged with the
/// request's method and path. Responses from an `inner` that returns
/// normally pass through untouched.
///
/// Both halves of a handler call are guarded: the synchronous part that
/// builds the future and every poll of that future.
pub fn recover_panic(inner: BoxedHandler) -> BoxedHandler {
    Arc::new(RecoverPanic { inner })
}

struct RecoverPanic {
    inner: BoxedHandler,
}

impl ErasedHandler for RecoverPanic {
    fn call(&self, req: Request) -> BoxFuture {
        let method = req.method().clone();
        let path = req.path().to_owned();

        let fut = match panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                let failure = RecoveredPanic::from_payload(payload);
                return Box::pin(async move { recovered(&method, &path, failure) });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => recovered(&method, &path, RecoveredPanic::from_payload(payload)),
            }
        })
    }
}

fn recovered(method: &http::Method, path: &str, failure: RecoveredPanic) -> Response {
    responses::log_error(method, path, &failure);
    let mut res = responses::error_response(
        http::StatusCode::INTERNAL_SERVER_ERROR,
        responses::SERVER_ERROR_MESSAGE,
    );
    res.headers.insert(CONNECTION, HeaderValue::from_static("close"));
    res
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use http::{Method, StatusCode};
    use serde_json::{json, Value};
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::handler::boxed;
    use crate::responses::SERVER_ERROR_MESSAGE;

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_logs() -> (Captured, tracing::subscriber::DefaultGuard) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (captured, guard)
    }

    async fn something_went_wrong(_req: Request) -> Response {
        panic!("something went wrong")
    }

    async fn leaks_secret(_req: Request) -> Response {
        panic!("secret database password in panic")
    }

    async fn inner_failure(_req: Request) -> Response {
        panic!("inner failure")
    }

    fn assert_recovered(res: &Response) {
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.header("connection"), Some("close"));
        let body: Value = serde_json::from_slice(res.body()).expect("body is valid JSON");
        assert_eq!(body, json!({"error": SERVER_ERROR_MESSAGE}));
    }

    #[tokio::test]
    async fn panic_inside_future_becomes_500() {
        let handler = recover_panic(boxed(something_went_wrong));

        let res = handler.call(Request::new(Method::GET, "/test")).await;

        assert_recovered(&res);
    }

    #[tokio::test]
    async fn panic_before_future_is_built_becomes_500() {
        let handler = recover_panic(boxed(|req: Request| {
            if req.path() == "/test" {
                panic!("synchronous failure");
            }
            async { Response::text("ok") }
        }));

        let res = handler.call(Request::new(Method::GET, "/test")).await;

        assert_recovered(&res);
    }

    #[tokio::test]
    async fn normal_response_passes_through() {
        let handler = recover_panic(boxed(|_req: Request| async { Response::text("ok") }));

        let res = handler.call(Request::new(Method::GET, "/test")).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"ok");
        assert_eq!(res.header("connection"), None);
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[tokio::test]
    async fn error_responses_from_inner_are_not_rewritten() {
        let handler = recover_panic(boxed(|_req: Request| async { responses::not_found() }));

        let res = handler.call(Request::new(Method::GET, "/missing")).await;

        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.header("connection"), None);
    }

    #[tokio::test]
    async fn panic_message_is_logged_not_returned() {
        let (logs, _guard) = capture_logs();
        let handler = recover_panic(boxed(leaks_secret));

        let res = handler.call(Request::new(Method::POST, "/v1/movies")).await;

        let body = String::from_utf8_lossy(res.body()).into_owned();
        assert!(!body.contains("secret"));
        let logs = logs.contents();
        assert!(logs.contains("panic: secret database password in panic"), "{logs}");
        assert!(logs.contains("request_method=POST"), "{logs}");
        assert!(logs.contains("request_url=/v1/movies"), "{logs}");
    }

    #[tokio::test]
    async fn nested_boundaries_report_once() {
        let (logs, _guard) = capture_logs();
        let handler = recover_panic(recover_panic(boxed(inner_failure)));

        let res = handler.call(Request::new(Method::GET, "/test")).await;

        assert_recovered(&res);
        assert_eq!(res.headers().get_all(CONNECTION).iter().count(), 1);
        assert_eq!(logs.contents().matches("panic: inner failure").count(), 1);
    }

    /// Panics again when dropped.
    struct PanicsOnDrop;

    impl Drop for PanicsOnDrop {
        fn drop(&mut self) {
            panic!("payload drop");
        }
    }

    async fn panics_with_hostile_payload(_req: Request) -> Response {
        panic::panic_any(PanicsOnDrop)
    }

    #[tokio::test]
    async fn payload_that_panics_on_drop_stays_inside_boundary() {
        let handler = recover_panic(boxed(panics_with_hostile_payload));

        let res = handler.call(Request::new(Method::GET, "/test")).await;

        assert_recovered(&res);
    }

    #[test]
    fn payload_messages() {
        let from_str = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(RecoveredPanic::from_payload(from_str).message(), "static");

        let from_string = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(RecoveredPanic::from_payload(from_string).message(), "formatted 42");

        let opaque = panic::catch_unwind(|| panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(
            RecoveredPanic::from_payload(opaque).message(),
            "non-string panic payload"
        );
    }
}
