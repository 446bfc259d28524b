use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::WorkflowApi;
use crate::errors::ClientError;
use crate::event::RunResult;
use crate::session::StreamInput;
use crate::view::ViewState;

const COMPLETION_CHANNEL_CAPACITY: usize = 64;

/// User actions wired to the three controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Run,
    StreamRun,
    Cancel,
}

/// Result of a spawned network task, delivered back to the controller.
#[derive(Debug)]
enum Completion {
    Run(Result<RunResult, ClientError>),
    Stream { session: u64, input: StreamInput },
    Cancel(Result<serde_json::Value, ClientError>),
}

struct ActiveStream {
    session: u64,
    task: JoinHandle<()>,
}

/// Owns the `ViewState` and is the only place it changes.
///
/// Network work runs in spawned tasks; their results come back through a
/// channel and are applied one at a time by `step`.
pub struct ViewController {
    api: Arc<dyn WorkflowApi>,
    state: ViewState,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    stream: Option<ActiveStream>,
    next_session: u64,
    cancels_in_flight: usize,
}

impl ViewController {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        let (tx, rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            api,
            state: ViewState::new(),
            tx,
            rx,
            stream: None,
            next_session: 0,
            cancels_in_flight: 0,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// True while any request or the stream is outstanding.
    pub fn is_busy(&self) -> bool {
        self.state.running() || self.state.streaming() || self.cancels_in_flight > 0
    }

    /// Handles a user action. Must be called from within a tokio runtime.
    ///
    /// Actions whose control is disabled are ignored.
    pub fn dispatch(&mut self, action: Action) {
        info!(event = "view.action", domain = "view", action = ?action);
        match action {
            Action::Run => self.start_run(),
            Action::StreamRun => self.start_stream(),
            Action::Cancel => self.start_cancel(),
        }
    }

    /// Waits for the next network completion and applies it.
    ///
    /// Returns false if there is nothing left that could ever complete.
    pub async fn step(&mut self) -> bool {
        if !self.is_busy() && self.rx.is_empty() {
            return false;
        }
        let Some(completion) = self.rx.recv().await else {
            return false;
        };
        self.apply(completion);
        true
    }

    /// Steps until no request or stream is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() {
            if !self.step().await {
                break;
            }
        }
    }

    fn start_run(&mut self) {
        if !self.state.begin_run() {
            debug!(event = "view.run_ignored", domain = "view", reason = "already running");
            return;
        }
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = api.run_workflow().await;
            let _ = tx.send(Completion::Run(outcome)).await;
        });
    }

    fn start_stream(&mut self) {
        if !self.state.begin_stream() {
            debug!(event = "view.stream_ignored", domain = "view", reason = "already streaming");
            return;
        }
        let session = self.next_session;
        self.next_session += 1;
        info!(event = "stream.session_started", domain = "sse", session);
        let task = tokio::spawn(stream_task(Arc::clone(&self.api), session, self.tx.clone()));
        self.stream = Some(ActiveStream { session, task });
    }

    fn start_cancel(&mut self) {
        let Some(run_id) = self.state.begin_cancel() else {
            debug!(event = "view.cancel_ignored", domain = "view", reason = "no run id");
            return;
        };
        info!(event = "run.cancel_requested", domain = "view", run_id = %run_id);
        self.cancels_in_flight += 1;
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = api.cancel_run(&run_id).await;
            let _ = tx.send(Completion::Cancel(outcome)).await;
        });
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Run(outcome) => {
                if let Err(err) = &outcome {
                    info!(event = "run.failed", domain = "view", error = %err);
                }
                self.state.finish_run(outcome);
            }
            Completion::Stream { session, input } => {
                if self.stream.as_ref().map(|s| s.session) != Some(session) {
                    debug!(event = "stream.stale_input_dropped", domain = "sse", session);
                    return;
                }
                if self.state.apply_stream_input(input) {
                    self.close_stream();
                }
            }
            Completion::Cancel(outcome) => {
                self.cancels_in_flight = self.cancels_in_flight.saturating_sub(1);
                self.state.finish_cancel(outcome);
            }
        }
    }

    fn close_stream(&mut self) {
        if let Some(active) = self.stream.take() {
            info!(event = "stream.session_closed", domain = "sse", session = active.session);
            active.task.abort();
        }
    }
}

impl Drop for ViewController {
    fn drop(&mut self) {
        if let Some(active) = self.stream.take() {
            active.task.abort();
        }
    }
}

async fn stream_task(api: Arc<dyn WorkflowApi>, session: u64, tx: mpsc::Sender<Completion>) {
    let mut stream = match api.open_stream().await {
        Ok(stream) => stream,
        Err(err) => {
            let input = StreamInput::TransportError(err.to_string());
            let _ = tx.send(Completion::Stream { session, input }).await;
            return;
        }
    };

    while let Some(item) = stream.next().await {
        let (input, failed) = match item {
            Ok(data) => (StreamInput::Message(data), false),
            Err(err) => (StreamInput::TransportError(err.to_string()), true),
        };
        if tx.send(Completion::Stream { session, input }).await.is_err() || failed {
            return;
        }
    }

    let input = StreamInput::TransportError("event stream closed by server".into());
    let _ = tx.send(Completion::Stream { session, input }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EventStream;
    use crate::event::{EventKind, LogEvent};
    use futures::stream;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum StreamEnd {
        /// Stays open after the scripted items.
        Pending,
        /// Server closes the connection after the scripted items.
        Close,
    }

    struct FakeApi {
        run: Result<RunResult, ClientError>,
        open: Result<(), ClientError>,
        items: Vec<Result<String, ClientError>>,
        end: StreamEnd,
        cancel: Result<serde_json::Value, ClientError>,
        cancelled: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                run: Ok(json!({"ok": true})),
                open: Ok(()),
                items: Vec::new(),
                end: StreamEnd::Pending,
                cancel: Ok(json!({"status": "cancelled"})),
                cancelled: Mutex::new(Vec::new()),
            }
        }

        fn stream(mut self, items: &[&str], end: StreamEnd) -> Self {
            self.items = items.iter().map(|s| Ok(s.to_string())).collect();
            self.end = end;
            self
        }

        fn cancelled(&self) -> Vec<String> {
            self.cancelled.lock().expect("lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl WorkflowApi for FakeApi {
        async fn run_workflow(&self) -> Result<RunResult, ClientError> {
            self.run.clone()
        }

        async fn cancel_run(&self, run_id: &str) -> Result<serde_json::Value, ClientError> {
            self.cancelled.lock().expect("lock").push(run_id.to_string());
            self.cancel.clone()
        }

        async fn open_stream(&self) -> Result<EventStream, ClientError> {
            self.open.clone()?;
            let items = stream::iter(self.items.clone());
            let events: EventStream = match self.end {
                StreamEnd::Pending => Box::pin(items.chain(stream::pending())),
                StreamEnd::Close => Box::pin(items),
            };
            Ok(events)
        }
    }

    fn controller(api: FakeApi) -> (ViewController, Arc<FakeApi>) {
        let api = Arc::new(api);
        (ViewController::new(api.clone()), api)
    }

    fn kinds(view: &ViewState) -> Vec<EventKind> {
        view.logs().iter().map(LogEvent::kind).collect()
    }

    #[tokio::test]
    async fn run_action_displays_result() {
        let (mut ctl, _api) = controller(FakeApi::new());
        assert!(!ctl.state().running());
        ctl.dispatch(Action::Run);
        assert!(ctl.state().running());
        ctl.settle().await;
        assert!(!ctl.state().running());
        assert_eq!(ctl.state().result(), Some(&json!({"ok": true})));
    }

    #[tokio::test]
    async fn failed_run_displays_error_object() {
        let mut api = FakeApi::new();
        api.run = Err(ClientError::request("run-workflow", 500));
        let (mut ctl, _api) = controller(api);
        ctl.dispatch(Action::Run);
        ctl.settle().await;
        let error = ctl.state().result().expect("result")["error"]
            .as_str()
            .expect("error string")
            .to_string();
        assert!(error.contains("500"));
        assert!(ctl.state().can_run());
    }

    #[tokio::test]
    async fn stream_session_runs_to_done() {
        let api = FakeApi::new().stream(
            &[
                r#"{"type":"started","run_id":"abc123"}"#,
                r#"{"type":"done","result":{"ok":true}}"#,
            ],
            StreamEnd::Pending,
        );
        let (mut ctl, _api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        assert!(ctl.state().streaming());
        ctl.settle().await;
        let view = ctl.state();
        assert_eq!(view.logs().len(), 2);
        assert_eq!(view.run_id(), Some("abc123"));
        assert_eq!(view.result(), Some(&json!({"ok": true})));
        assert!(!view.streaming());
    }

    #[tokio::test]
    async fn parse_errors_do_not_end_the_session() {
        let api = FakeApi::new().stream(
            &["not-json", r#"{"type":"error","error":"boom"}"#],
            StreamEnd::Pending,
        );
        let (mut ctl, _api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        assert!(ctl.step().await);
        assert!(ctl.state().streaming());
        assert_eq!(ctl.state().logs(), &[LogEvent::parse_error("not-json")]);
        ctl.settle().await;
        assert_eq!(kinds(ctl.state()), vec![EventKind::ParseError, EventKind::Error]);
        assert!(!ctl.state().streaming());
    }

    #[tokio::test]
    async fn server_close_without_terminal_is_sse_error() {
        let api = FakeApi::new().stream(
            &[r#"{"type":"started","run_id":"abc123"}"#],
            StreamEnd::Close,
        );
        let (mut ctl, _api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        ctl.settle().await;
        assert_eq!(kinds(ctl.state()), vec![EventKind::Started, EventKind::SseError]);
        assert!(!ctl.state().streaming());
    }

    #[tokio::test]
    async fn connect_failure_is_sse_error() {
        let mut api = FakeApi::new();
        api.open = Err(ClientError::transport("connection refused"));
        let (mut ctl, _api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        ctl.settle().await;
        assert_eq!(kinds(ctl.state()), vec![EventKind::SseError]);
        assert!(ctl.state().can_stream());
    }

    #[tokio::test]
    async fn cancel_without_run_id_issues_nothing() {
        let (mut ctl, api) = controller(FakeApi::new());
        ctl.dispatch(Action::Cancel);
        assert!(!ctl.is_busy());
        assert!(!ctl.step().await);
        assert!(api.cancelled().is_empty());
        assert!(ctl.state().logs().is_empty());
    }

    #[tokio::test]
    async fn cancel_posts_run_id_and_logs_both_sides() {
        let api = FakeApi::new().stream(
            &[r#"{"type":"started","run_id":"abc123"}"#],
            StreamEnd::Pending,
        );
        let (mut ctl, api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        while ctl.state().run_id().is_none() {
            assert!(ctl.step().await);
        }
        ctl.dispatch(Action::Cancel);
        assert_eq!(kinds(ctl.state()).last(), Some(&EventKind::Client));
        while ctl.state().logs().len() < 3 {
            assert!(ctl.step().await);
        }
        assert_eq!(api.cancelled(), vec!["abc123".to_string()]);
        assert_eq!(
            kinds(ctl.state()),
            vec![EventKind::Started, EventKind::Client, EventKind::CancelResponse]
        );
        assert!(ctl.state().streaming(), "stream keeps listening after cancel");
    }

    #[tokio::test]
    async fn cancel_may_overlap_a_run_request() {
        let api = FakeApi::new().stream(
            &[
                r#"{"type":"started","run_id":"abc123"}"#,
                r#"{"type":"done","result":null}"#,
            ],
            StreamEnd::Pending,
        );
        let (mut ctl, api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        ctl.settle().await;
        ctl.dispatch(Action::Run);
        ctl.dispatch(Action::Cancel);
        assert!(ctl.state().running());
        ctl.settle().await;
        assert_eq!(api.cancelled(), vec!["abc123".to_string()]);
        assert_eq!(ctl.state().result(), Some(&json!({"ok": true})));
        assert_eq!(kinds(ctl.state()).last(), Some(&EventKind::CancelResponse));
    }

    #[tokio::test]
    async fn messages_after_terminal_event_are_dropped() {
        let api = FakeApi::new().stream(
            &[r#"{"type":"done","result":1}"#, r#"{"type":"late"}"#],
            StreamEnd::Close,
        );
        let (mut ctl, _api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        ctl.settle().await;
        ctl.dispatch(Action::StreamRun);
        ctl.settle().await;
        assert_eq!(kinds(ctl.state()), vec![EventKind::Done]);
        assert_eq!(ctl.state().result(), Some(&json!(1)));
    }

    #[tokio::test]
    async fn stream_run_is_ignored_while_streaming() {
        let api = FakeApi::new().stream(&[], StreamEnd::Pending);
        let (mut ctl, _api) = controller(api);
        ctl.dispatch(Action::StreamRun);
        ctl.dispatch(Action::StreamRun);
        assert!(ctl.state().streaming());
        assert_eq!(ctl.next_session, 1);
    }
}
