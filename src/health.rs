//! Health-check handlers.
//!
//! | Handler | Typical path | Answer |
//! |---|---|---|
//! | [`liveness`] | `/healthz` | The process can answer HTTP at all. |
//! | [`readiness`] | `/readyz` | The service may receive traffic. |
//! | [`healthcheck`] | `/v1/healthcheck` | JSON status with environment and version. |
//!
//! ```rust
//! use greenlight::{health, Router};
//!
//! let app = Router::new()
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness)
//!     .get("/v1/healthcheck", health::healthcheck("development", "1.0.0"));
//! ```

use bytes::Bytes;
use serde::Serialize;

use crate::handler::Handler;
use crate::{Request, Response};

/// Always `200 OK` with body `"ok"`.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"`. Replace with your own handler to gate on
/// dependency health.
pub async fn readiness(_req: Request) -> Response {
    Response::text("ready")
}

#[derive(Serialize)]
struct Status<'a> {
    status: &'a str,
    system_info: SystemInfo<'a>,
}

#[derive(Serialize)]
struct SystemInfo<'a> {
    environment: &'a str,
    version: &'a str,
}

/// Builds the `/v1/healthcheck` handler.
///
/// The body is rendered once, up front:
///
/// ```json
/// {"status":"available","system_info":{"environment":"production","version":"1.0.0"}}
/// ```
pub fn healthcheck(environment: &str, version: &str) -> impl Handler + use<> {
    let status = Status {
        status: "available",
        system_info: SystemInfo { environment, version },
    };
    let body = match serde_json::to_vec(&status) {
        Ok(body) => Bytes::from(body),
        Err(e) => {
            tracing::error!("failed to encode healthcheck body: {e}");
            Bytes::new()
        }
    };

    move |_req: Request| {
        let body = body.clone();
        async move { Response::json(body) }
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use serde_json::{json, Value};

    use super::*;
    use crate::handler::boxed;

    #[tokio::test]
    async fn healthcheck_reports_environment_and_version() {
        let handler = boxed(healthcheck("staging", "0.1.0"));

        let res = handler.call(Request::new(Method::GET, "/v1/healthcheck")).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(
            body,
            json!({"status": "available", "system_info": {"environment": "staging", "version": "0.1.0"}})
        );
    }

    #[tokio::test]
    async fn liveness_is_ok() {
        let res = liveness(Request::new(Method::GET, "/healthz")).await;
        assert_eq!(res.body(), b"ok");
    }
}
