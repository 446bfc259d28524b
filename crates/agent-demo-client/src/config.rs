use std::time::Duration;

use reqwest::Url;

use crate::errors::ClientError;

/// Backend address used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

const BASE_URL_ENV: &str = "AGENT_DEMO_BASE_URL";
const TIMEOUT_ENV: &str = "AGENT_DEMO_TIMEOUT_SECS";
const USE_OPENAI_ENV: &str = "AGENT_DEMO_USE_OPENAI";

/// Configuration for the workflow backend client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the workflow backend.
    pub base_url: String,
    /// Optional per-request timeout. Requests wait indefinitely when unset.
    ///
    /// Never applied to the event stream, which stays open for the whole run.
    pub timeout: Option<Duration>,
    /// Ask the backend to run with its OpenAI adapter instead of the mock LLM.
    pub use_openai: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            use_openai: false,
        }
    }
}

impl ClientConfig {
    /// Creates a config pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().base_url(base_url)
    }

    /// Builds a config from `AGENT_DEMO_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }
        if let Some(raw) = lookup(TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!("{TIMEOUT_ENV} must be a whole number of seconds"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup(USE_OPENAI_ENV) {
            config.use_openai = parse_bool(&raw).ok_or_else(|| {
                ClientError::Config(format!("{USE_OPENAI_ENV} must be a boolean, got {raw:?}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets a request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Toggles the `use_openai` query flag on run requests.
    pub fn use_openai(mut self, use_openai: bool) -> Self {
        self.use_openai = use_openai;
        self
    }

    /// Checks that the base URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = self.parsed_base()?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ClientError::Config(format!(
                "unsupported base URL scheme {other:?}"
            ))),
        }
    }

    pub(crate) fn run_workflow_url(&self) -> Result<Url, ClientError> {
        let mut url = self.endpoint(&["run-workflow"])?;
        if self.use_openai {
            url.query_pairs_mut().append_pair("use_openai", "true");
        }
        Ok(url)
    }

    pub(crate) fn stream_workflow_url(&self) -> Result<Url, ClientError> {
        self.endpoint(&["stream-workflow"])
    }

    pub(crate) fn cancel_url(&self, run_id: &str) -> Result<Url, ClientError> {
        self.endpoint(&["cancel", run_id])
    }

    pub(crate) fn health_url(&self) -> Result<Url, ClientError> {
        self.endpoint(&["health"])
    }

    fn parsed_base(&self) -> Result<Url, ClientError> {
        Url::parse(self.base_url.trim())
            .map_err(|e| ClientError::Config(format!("invalid base URL {:?}: {e}", self.base_url)))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.parsed_base()?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ClientError::Config(format!("base URL {:?} cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
