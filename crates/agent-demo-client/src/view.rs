use serde_json::{Value, json};

use crate::errors::ClientError;
use crate::event::{LogEvent, RunResult};
use crate::session::{self, SessionEffect, SessionState, StreamInput, Transition};

/// Everything the view renders.
///
/// Mutated only through the transition methods below, one per user action or
/// network completion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    running: bool,
    session: SessionState,
    logs: Vec<LogEvent>,
    run_id: Option<String>,
    result: Option<RunResult>,
}

impl ViewState {
    /// Idle view: no request in flight, empty log, no result.
    pub fn new() -> Self {
        Self::default()
    }

    /// A Run request is in flight.
    pub fn running(&self) -> bool {
        self.running
    }

    /// A streaming session is open.
    pub fn streaming(&self) -> bool {
        self.session == SessionState::Streaming
    }

    /// Current session state.
    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Log entries of the current (or last) streaming session, oldest first.
    pub fn logs(&self) -> &[LogEvent] {
        &self.logs
    }

    /// Run id captured from the current (or last) session's `started` event.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Last run result, or the `{"error": ..}` object of a failed run.
    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    /// Whether the Run control accepts a click.
    pub fn can_run(&self) -> bool {
        !self.running
    }

    /// Whether the Stream Run control accepts a click.
    pub fn can_stream(&self) -> bool {
        !self.streaming()
    }

    /// Whether the Cancel control accepts a click.
    pub fn can_cancel(&self) -> bool {
        self.run_id.is_some()
    }

    /// Run clicked. Returns false (and changes nothing) if a run is in flight.
    pub fn begin_run(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.result = None;
        true
    }

    /// Run request settled.
    pub fn finish_run(&mut self, outcome: Result<RunResult, ClientError>) {
        self.result = Some(match outcome {
            Ok(result) => result,
            Err(err) => error_result(&err),
        });
        self.running = false;
    }

    /// Stream Run clicked. Returns true if the caller must open a connection.
    ///
    /// The log and the previous run id are reset before any event arrives.
    pub fn begin_stream(&mut self) -> bool {
        let transition = session::start(self.session);
        self.apply(transition)
    }

    /// Feeds one stream input through the session state machine. Returns
    /// true if the caller must close the connection.
    pub fn apply_stream_input(&mut self, input: StreamInput) -> bool {
        let transition = session::handle_input(self.session, input);
        let closes = transition.closes_connection();
        self.apply(transition);
        closes
    }

    /// Cancel clicked. Returns the run id to cancel, or `None` when there is
    /// nothing to cancel (no request, no log entry).
    pub fn begin_cancel(&mut self) -> Option<String> {
        let run_id = self.run_id.clone()?;
        self.logs
            .push(LogEvent::client(format!("Requesting cancel for {run_id}")));
        Some(run_id)
    }

    /// Cancel request settled.
    pub fn finish_cancel(&mut self, outcome: Result<Value, ClientError>) {
        self.logs.push(match outcome {
            Ok(body) => LogEvent::cancel_response(body),
            Err(err) => LogEvent::cancel_error(err),
        });
    }

    /// Applies a session transition. Returns true if it asked to open a
    /// connection.
    fn apply(&mut self, transition: Transition) -> bool {
        let mut open = false;
        self.session = transition.next;
        for effect in transition.effects {
            match effect {
                SessionEffect::ClearLogs => {
                    self.logs.clear();
                    self.run_id = None;
                }
                SessionEffect::OpenConnection => open = true,
                SessionEffect::AppendLog(event) => self.logs.push(event),
                SessionEffect::SetRunId(run_id) => self.run_id = Some(run_id),
                SessionEffect::SetResult(result) => self.result = Some(result),
                SessionEffect::CloseConnection => {}
            }
        }
        open
    }
}

fn error_result(err: &ClientError) -> Value {
    json!({ "error": err.to_string() })
}
