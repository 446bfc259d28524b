use std::fmt;

use serde_json::{Value, json};

use crate::errors::ClientError;

/// Opaque JSON value returned by the run endpoint.
pub type RunResult = Value;

/// Discriminator of a log event, read from its `type` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Backend announced a run; carries `run_id`.
    Started,
    /// Terminal success; carries `result`.
    Done,
    /// Terminal failure reported by the backend.
    Error,
    /// Backend acknowledged a cancel on the stream.
    CancelRequested,
    /// Backend reports the run task was cancelled.
    Cancelled,
    /// Client-side: stream payload was not JSON.
    ParseError,
    /// Client-side: stream transport failed.
    SseError,
    /// Client-side note (for example a cancel being requested).
    Client,
    /// Client-side: body of a successful cancel request.
    CancelResponse,
    /// Client-side: cancel request failed.
    CancelError,
    /// Any other `type` value, passed through verbatim.
    Other(String),
    /// No string `type` field at all.
    Untyped,
}

impl EventKind {
    fn from_type(value: Option<&str>) -> Self {
        match value {
            Some("started") => Self::Started,
            Some("done") => Self::Done,
            Some("error") => Self::Error,
            Some("cancel_requested") => Self::CancelRequested,
            Some("cancelled") => Self::Cancelled,
            Some("parse_error") => Self::ParseError,
            Some("sse_error") => Self::SseError,
            Some("client") => Self::Client,
            Some("cancel_response") => Self::CancelResponse,
            Some("cancel_error") => Self::CancelError,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Untyped,
        }
    }

    /// True for the kinds that end a streaming session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One entry of the log sequence.
///
/// Events from the stream are kept exactly as received; the synthetic
/// constructors build the client-side entries with the same JSON shape.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LogEvent(Value);

impl LogEvent {
    /// Wraps a raw JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parses a stream payload.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self)
    }

    /// `parse_error{raw}`: a stream payload that was not JSON.
    pub fn parse_error(raw: impl Into<String>) -> Self {
        Self(json!({ "type": "parse_error", "raw": raw.into() }))
    }

    /// `sse_error{error}`: the stream transport failed or closed early.
    pub fn sse_error(error: impl fmt::Display) -> Self {
        Self(json!({ "type": "sse_error", "error": error.to_string() }))
    }

    /// `client{msg}`: a note from the client itself.
    pub fn client(msg: impl Into<String>) -> Self {
        Self(json!({ "type": "client", "msg": msg.into() }))
    }

    /// `cancel_response{body}`: what the cancel endpoint answered.
    pub fn cancel_response(body: Value) -> Self {
        Self(json!({ "type": "cancel_response", "body": body }))
    }

    /// `cancel_error{error}`: the cancel request failed.
    pub fn cancel_error(error: impl fmt::Display) -> Self {
        Self(json!({ "type": "cancel_error", "error": error.to_string() }))
    }

    /// Raw `type` field, if it is a string.
    pub fn type_name(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Typed view of [`type_name`](Self::type_name).
    pub fn kind(&self) -> EventKind {
        EventKind::from_type(self.type_name())
    }

    /// `run_id` carried by `started` events.
    pub fn run_id(&self) -> Option<&str> {
        self.0.get("run_id").and_then(Value::as_str)
    }

    /// `result` carried by `done` events. A missing field reads as `null`.
    pub fn result(&self) -> Value {
        self.0.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Display-only iteration counter. Zero and non-numeric values are ignored.
    pub fn iteration(&self) -> Option<u64> {
        self.0
            .get("iteration")
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
    }

    /// The entry as received or built.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for LogEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Malformed payloads become `parse_error` entries; any other failure on the
/// stream is logged as `sse_error`.
impl From<ClientError> for LogEvent {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::MalformedEvent { raw, .. } => Self::parse_error(raw),
            other => Self::sse_error(other),
        }
    }
}
