//! Error responses.
//!
//! Every error the API reports has the shape `{"error": <message>}`. The
//! message is a string, except for validation failures where it is an object
//! mapping each offending field to what is wrong with it.

use std::collections::BTreeMap;
use std::fmt::Display;

use http::header::{HeaderMap, HeaderValue, ALLOW};
use http::{Method, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::json::{self, Envelope};
use crate::request::Request;
use crate::response::Response;

/// Message sent for every unexpected server-side failure, panics included.
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// The value stored under the `error` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(BTreeMap<String, String>),
}

impl From<&str> for ErrorMessage {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for ErrorMessage {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<BTreeMap<String, String>> for ErrorMessage {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self::Fields(fields)
    }
}

/// Builds `{"error": message}` with the given status.
pub fn error_response(status: StatusCode, message: impl Into<ErrorMessage>) -> Response {
    error_response_with_headers(status, message, HeaderMap::new())
}

fn error_response_with_headers(
    status: StatusCode,
    message: impl Into<ErrorMessage>,
    headers: HeaderMap,
) -> Response {
    let message: ErrorMessage = message.into();
    let envelope = Envelope::new().with("error", message);
    json::write_with_headers(status, &envelope, headers)
}

/// `500` — logs `cause` with the request's method and path; the client only
/// ever sees [`SERVER_ERROR_MESSAGE`].
pub fn server_error(req: &Request, cause: impl Display) -> Response {
    log_error(req.method(), req.path(), &cause);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
}

pub(crate) fn log_error(method: &Method, path: &str, cause: &dyn Display) {
    error!(request_method = %method, request_url = %path, "{cause}");
}

/// `404`.
pub fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "the requested resource could not be found")
}

/// `405` with an `allow` header listing the methods the path does accept.
pub fn method_not_allowed(method: &Method, allowed: &[Method]) -> Response {
    let mut headers = HeaderMap::new();
    let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        headers.insert(ALLOW, value);
    }
    error_response_with_headers(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("the {method} method is not supported for this resource"),
        headers,
    )
}

/// `400` with the caller's description of what was wrong.
pub fn bad_request(message: impl Into<String>) -> Response {
    let message: String = message.into();
    error_response(StatusCode::BAD_REQUEST, message)
}

/// `422` with one message per invalid field.
pub fn failed_validation(errors: BTreeMap<String, String>) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, errors)
}

/// `413` naming the limit the body exceeded.
pub fn body_too_large(limit: usize) -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("the request body must not be larger than {limit} bytes"),
    )
}

/// `409`.
pub fn edit_conflict() -> Response {
    error_response(
        StatusCode::CONFLICT,
        "unable to update the record due to an edit conflict, please try again",
    )
}

/// `429`.
pub fn rate_limit_exceeded() -> Response {
    error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
}
