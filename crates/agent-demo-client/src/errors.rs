/// Errors produced by the workflow backend client.
///
/// None of these are fatal to the view: the controller turns every variant
/// into either the result's `error` field or a synthetic log entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Backend answered with a non-success HTTP status.
    #[error("{operation} request failed with status {status}")]
    Request { operation: String, status: u16 },
    /// Connection, read, or stream failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// A stream payload that is not valid JSON.
    #[error("malformed event: {message}")]
    MalformedEvent { raw: String, message: String },
    /// A success response whose body could not be decoded as JSON.
    #[error("decode error: {0}")]
    Decode(String),
    /// Invalid client configuration (base URL, timeout, etc.).
    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// Creates a request error for a non-success status.
    pub fn request(operation: impl Into<String>, status: u16) -> Self {
        Self::Request {
            operation: operation.into(),
            status,
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a malformed event error carrying the raw payload.
    pub fn malformed_event(raw: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedEvent {
            raw: raw.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status for request errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}
