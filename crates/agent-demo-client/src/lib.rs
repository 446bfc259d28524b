//! Client side of the hybrid agent workflow demo.
//!
//! The crate talks to the workflow backend (`/run-workflow`,
//! `/stream-workflow`, `/cancel/{run_id}`) and keeps the state a front end
//! renders: running/streaming flags, the streamed log, the captured run id
//! and the last result.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agent_demo_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let api = HttpWorkflowApi::new(ClientConfig::default())?;
//! let mut controller = ViewController::new(Arc::new(api));
//!
//! controller.dispatch(Action::StreamRun);
//! controller.settle().await;
//!
//! println!("{}", render_view(controller.state()));
//! # Ok(())
//! # }
//! ```

/// HTTP/SSE client for the workflow backend.
pub mod api;
/// Backend address and request settings.
pub mod config;
/// Drives user actions and network completions into the view state.
pub mod controller;
/// Client error taxonomy.
pub mod errors;
/// Log events and their discriminator.
pub mod event;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Text rendering of the view.
pub mod render;
/// Streaming session state machine.
pub mod session;
mod transport;
/// View state and its transitions.
pub mod view;

pub use api::{EventStream, HealthStatus, HttpWorkflowApi, WorkflowApi};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use controller::{Action, ViewController};
pub use errors::ClientError;
pub use event::{EventKind, LogEvent, RunResult};
pub use observability::{LogSettings, LogSink, init_observability, init_with};
pub use render::{Renderer, TextRenderer, render_view};
pub use session::{SessionEffect, SessionState, StreamInput, Transition};
pub use view::ViewState;
