//! JSON envelope writer.
//!
//! Every JSON body the API sends is an object with a named top-level key —
//! `{"movie": {...}}`, `{"error": "..."}` — never a bare value. [`Envelope`]
//! holds those keys and [`write`] turns it into a [`Response`].

use std::collections::BTreeMap;

use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::response::Response;

/// Top-level keys of a JSON response body.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Envelope(BTreeMap<String, Value>);

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key` to the envelope, replacing any previous value.
    ///
    /// Values that fail to serialize are stored as `null` and logged.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key: String = key.into();
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            error!(key = %key, "envelope value not serializable: {e}");
            Value::Null
        });
        self.0.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Serializes `envelope` as the body of a `status` response.
pub fn write(status: StatusCode, envelope: &Envelope) -> Response {
    write_with_headers(status, envelope, HeaderMap::new())
}

/// Like [`write`], adding `headers` to the response.
///
/// If serialization fails the error is logged and a bodiless
/// `500 Internal Server Error` is returned instead.
pub fn write_with_headers(status: StatusCode, envelope: &Envelope, headers: HeaderMap) -> Response {
    let mut body = match serde_json::to_vec(envelope) {
        Ok(body) => body,
        Err(e) => {
            error!("failed to encode JSON response: {e}");
            return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    body.push(b'\n');

    let mut res = Response::status(status);
    res.headers = headers;
    res.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res.body = body.into();
    res
}
