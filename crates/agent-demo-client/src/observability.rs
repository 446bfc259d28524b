//! Process-wide `tracing` setup for the console and the library.
//!
//! The rendered view owns stdout, so human-readable logs go to stderr and are
//! quiet (`warn`) unless asked for. A JSONL file sink is available for
//! debugging stream sessions without disturbing the terminal.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::parse_bool;

static INIT: OnceCell<()> = OnceCell::new();

const ENABLED_ENV: &str = "AGENT_DEMO_OBSERVABILITY_ENABLED";
const LEVEL_ENV: &str = "AGENT_DEMO_LOG_LEVEL";
const JSON_LOG_PATH_ENV: &str = "AGENT_DEMO_JSON_LOG_PATH";
const DEFAULT_FILTER: &str = "warn";

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Compact single-line records on stderr.
    Stderr,
    /// One JSON object per line, appended to `dir/file_name`.
    JsonFile { dir: PathBuf, file_name: String },
}

/// Logging settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `warn` or `agent_demo_client=debug`.
    pub filter: String,
    pub sink: LogSink,
}

impl LogSettings {
    /// Reads `AGENT_DEMO_OBSERVABILITY_ENABLED`, `AGENT_DEMO_LOG_LEVEL`
    /// (falling back to `RUST_LOG`) and `AGENT_DEMO_JSON_LOG_PATH`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let enabled = set(ENABLED_ENV)
            .map(|v| parse_bool(&v).unwrap_or(true))
            .unwrap_or(true);
        let filter = set(LEVEL_ENV)
            .or_else(|| set("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let sink = set(JSON_LOG_PATH_ENV)
            .map(|raw| json_sink(Path::new(&raw)))
            .unwrap_or(LogSink::Stderr);
        Self {
            enabled,
            filter,
            sink,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

fn json_sink(path: &Path) -> LogSink {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("agent-demo.logs.jsonl")
        .to_string();
    LogSink::JsonFile { dir, file_name }
}

/// Initializes logging from the process environment, once per process.
pub fn init_observability() {
    init_with(LogSettings::from_lookup(|key| std::env::var(key).ok()));
}

/// Initializes logging with explicit settings. Later calls are no-ops, as is
/// a call made after another global subscriber was installed.
pub fn init_with(settings: LogSettings) {
    INIT.get_or_init(|| {
        if !settings.enabled {
            return;
        }
        let registry = tracing_subscriber::registry().with(settings.env_filter());
        let _ = match &settings.sink {
            LogSink::Stderr => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            LogSink::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(dir);
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_target(false)
                            .with_writer(tracing_appender::rolling::never(dir, file_name)),
                    )
                    .try_init()
            }
        };
    });
}
