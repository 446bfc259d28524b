use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::event::RunResult;
use crate::transport::SseDecoder;

/// Stream of raw `data:` payloads, one item per SSE message.
///
/// The stream ends (`None`) when the server closes the connection.
pub type EventStream = Pin<Box<dyn futures::Stream<Item = Result<String, ClientError>> + Send>>;

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Operations the view needs from the workflow backend.
///
/// `HttpWorkflowApi` is the real implementation; tests substitute fakes.
#[async_trait::async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Runs the workflow synchronously and returns its JSON result.
    async fn run_workflow(&self) -> Result<RunResult, ClientError>;

    /// Asks the backend to cancel `run_id` and returns the response body.
    async fn cancel_run(&self, run_id: &str) -> Result<serde_json::Value, ClientError>;

    /// Opens the workflow event stream.
    async fn open_stream(&self) -> Result<EventStream, ClientError>;
}

/// Backend health payload.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// reqwest-backed client for the workflow backend.
pub struct HttpWorkflowApi {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpWorkflowApi {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client from `AGENT_DEMO_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Checks the backend's `/health` endpoint.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = self.config.health_url()?;
        let mut req = self.client.get(url);
        if let Some(timeout) = self.config.timeout {
            req = req.timeout(timeout);
        }
        let response = req
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("health request failed: {e}")))?;
        let value = read_json_body("health", response).await?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::Decode(format!("unexpected health body: {e}")))
    }

    async fn post_json(
        &self,
        operation: &str,
        url: reqwest::Url,
    ) -> Result<serde_json::Value, ClientError> {
        debug!(
            event = "http.request_started",
            domain = "http",
            operation = operation,
            path = url.path()
        );
        let mut req = self.client.post(url);
        if let Some(timeout) = self.config.timeout {
            req = req.timeout(timeout);
        }
        let response = req
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("{operation} request failed: {e}")))?;
        read_json_body(operation, response).await
    }
}

#[async_trait::async_trait]
impl WorkflowApi for HttpWorkflowApi {
    async fn run_workflow(&self) -> Result<RunResult, ClientError> {
        let url = self.config.run_workflow_url()?;
        self.post_json("run-workflow", url).await
    }

    async fn cancel_run(&self, run_id: &str) -> Result<serde_json::Value, ClientError> {
        let url = self.config.cancel_url(run_id)?;
        self.post_json("cancel", url).await
    }

    async fn open_stream(&self) -> Result<EventStream, ClientError> {
        let url = self.config.stream_workflow_url()?;
        debug!(event = "stream.connecting", domain = "sse", url = %url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("event stream connect failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::transport(format!(
                "event stream returned status {status}"
            )));
        }
        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(Box::pin(sse_data_stream(bytes_stream)))
    }
}

async fn read_json_body(
    operation: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value, ClientError> {
    let status = response.status();
    if !status.is_success() {
        debug!(
            event = "http.request_failed",
            domain = "http",
            operation = operation,
            status = status.as_u16()
        );
        return Err(ClientError::request(operation, status.as_u16()));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ClientError::transport(format!("{operation} body read failed: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::Decode(format!("{operation} response is not JSON: {e}")))
}

fn sse_data_stream(
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<String, ClientError>> + Send {
    struct State {
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(data) = state.pending.pop_front() {
                    return Ok(Some((data, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            if frame.is_message() {
                                state.pending.push_back(frame.data);
                            } else {
                                debug!(
                                    event = "stream.frame_skipped",
                                    domain = "sse",
                                    sse_event = frame.event.as_deref().unwrap_or_default()
                                );
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ClientError::transport(format!(
                            "event stream read failed: {e}"
                        )));
                    }
                    None => {
                        if state.decoder.pending_len() > 0 {
                            debug!(
                                event = "stream.trailing_bytes_dropped",
                                domain = "sse",
                                bytes = state.decoder.pending_len() as u64
                            );
                        }
                        state.done = true;
                    }
                }
            }
        },
    )
}
