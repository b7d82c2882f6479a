use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// HTTP verb accepted by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

/// One logical call against the proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Logical API path, e.g. `/data/{tenant}/stores`. May carry its own query string.
    pub path: String,
    pub method: Method,
    /// JSON body for POST calls. `None` is sent as `{}`.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            path: path.into(),
            method: Method::Post,
            body,
        }
    }

    /// Read an integer field from the JSON body (e.g. `from_date`).
    pub fn body_i64(&self, field: &str) -> Option<i64> {
        self.body.as_ref()?.get(field)?.as_i64()
    }
}

/// The `{status, data, total?}` wrapper every proxy response uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl Envelope {
    /// Build a successful envelope around a payload.
    pub fn ok(data: Value) -> Self {
        Self {
            status: true,
            data,
            total: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// The payload as a list: arrays as-is, a single object as one item, null as nothing.
    pub fn into_items(self) -> Vec<Value> {
        match self.data {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// Count reported by the count endpoint: `{total: n}` or a bare integer.
    pub fn count(&self) -> Option<u64> {
        match &self.data {
            Value::Number(n) => n.as_u64(),
            Value::Object(map) => map.get("total").and_then(Value::as_u64),
            _ => None,
        }
    }
}

/// Why a call did not produce a usable envelope.
///
/// Callers must treat any of these as "stop requesting this window", never
/// as proof that no more data exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoftFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("envelope reported status=false")]
    Unsuccessful,
}

impl SoftFailure {
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            SoftFailure::Timeout
        } else if err.is_connect() {
            SoftFailure::Connect(err.to_string())
        } else {
            SoftFailure::Transport(err.to_string())
        }
    }
}

/// Classified result of one gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Envelope),
    SoftFail(SoftFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_result(self) -> std::result::Result<Envelope, SoftFailure> {
        match self {
            Outcome::Success(envelope) => Ok(envelope),
            Outcome::SoftFail(failure) => Err(failure),
        }
    }
}

/// Classify a raw HTTP response into an [`Outcome`].
pub fn classify(status: u16, body: &[u8]) -> Outcome {
    if !(200..300).contains(&status) {
        return Outcome::SoftFail(SoftFailure::Status(status));
    }

    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return Outcome::SoftFail(SoftFailure::Malformed(e.to_string())),
    };

    match value {
        // The count endpoint may answer with a bare integer
        Value::Number(_) => Outcome::Success(Envelope::ok(value)),
        Value::Object(mut map) => {
            let Some(ok) = map.get("status").and_then(Value::as_bool) else {
                return Outcome::SoftFail(SoftFailure::Malformed(
                    "missing boolean status".to_string(),
                ));
            };
            if !ok {
                return Outcome::SoftFail(SoftFailure::Unsuccessful);
            }
            let total = map.get("total").and_then(Value::as_u64);
            let data = map.remove("data").unwrap_or(Value::Null);
            Outcome::Success(Envelope {
                status: true,
                data,
                total,
            })
        }
        _ => Outcome::SoftFail(SoftFailure::Malformed(
            "response is not an envelope".to_string(),
        )),
    }
}

/// Externally obtained session credential.
///
/// Never printed: `Debug` and `Display` are redacted.
pub struct SessionToken(SecretBox<str>);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Only call this when building the request header.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SessionToken {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
