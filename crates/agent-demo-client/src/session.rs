//! Streaming session state machine.
//!
//! `handle_input` is a pure function from (state, input) to (next state,
//! effects). The caller owns the connection and the log, and applies the
//! effects in order.

use crate::errors::ClientError;
use crate::event::{EventKind, LogEvent, RunResult};

/// Lifecycle of a streaming session: idle → streaming → idle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
}

/// Something that arrived from the event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamInput {
    /// Raw `data:` payload of one SSE message.
    Message(String),
    /// Connection failed, was refused, or was closed by the server.
    TransportError(String),
}

/// Side effect requested by a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEffect {
    ClearLogs,
    OpenConnection,
    AppendLog(LogEvent),
    SetRunId(String),
    SetResult(RunResult),
    CloseConnection,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<SessionEffect>,
}

impl Transition {
    fn stay(state: SessionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    /// True when the caller must tear down the connection.
    pub fn closes_connection(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, SessionEffect::CloseConnection))
    }
}

/// Starts a session. Starting while already streaming changes nothing.
pub fn start(state: SessionState) -> Transition {
    match state {
        SessionState::Streaming => Transition::stay(state),
        SessionState::Idle => Transition {
            next: SessionState::Streaming,
            effects: vec![SessionEffect::ClearLogs, SessionEffect::OpenConnection],
        },
    }
}

/// Applies one stream input to the session.
pub fn handle_input(state: SessionState, input: StreamInput) -> Transition {
    if state == SessionState::Idle {
        return Transition::stay(state);
    }
    match input {
        StreamInput::Message(raw) => handle_message(raw),
        StreamInput::TransportError(error) => Transition {
            next: SessionState::Idle,
            effects: vec![
                SessionEffect::AppendLog(LogEvent::sse_error(error)),
                SessionEffect::CloseConnection,
            ],
        },
    }
}

fn handle_message(raw: String) -> Transition {
    let event = match LogEvent::parse(&raw) {
        Ok(event) => event,
        Err(err) => {
            let malformed = ClientError::malformed_event(raw, err.to_string());
            return Transition {
                next: SessionState::Streaming,
                effects: vec![SessionEffect::AppendLog(malformed.into())],
            };
        }
    };

    let kind = event.kind();
    let run_id = event.run_id().map(ToOwned::to_owned);
    let result = (kind == EventKind::Done).then(|| event.result());

    let mut effects = vec![SessionEffect::AppendLog(event)];
    if kind == EventKind::Started
        && let Some(run_id) = run_id
    {
        effects.push(SessionEffect::SetRunId(run_id));
    }
    if !kind.is_terminal() {
        return Transition {
            next: SessionState::Streaming,
            effects,
        };
    }

    effects.push(SessionEffect::CloseConnection);
    if let Some(result) = result {
        effects.push(SessionEffect::SetResult(result));
    }
    Transition {
        next: SessionState::Idle,
        effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(raw: &str) -> StreamInput {
        StreamInput::Message(raw.to_string())
    }

    #[test]
    fn start_clears_logs_before_opening() {
        let t = start(SessionState::Idle);
        assert_eq!(t.next, SessionState::Streaming);
        assert_eq!(
            t.effects,
            vec![SessionEffect::ClearLogs, SessionEffect::OpenConnection]
        );
        assert!(start(SessionState::Streaming).effects.is_empty());
    }

    #[test]
    fn started_event_captures_run_id() {
        let t = handle_input(
            SessionState::Streaming,
            message(r#"{"type":"started","run_id":"abc123"}"#),
        );
        assert_eq!(t.next, SessionState::Streaming);
        assert_eq!(t.effects.len(), 2);
        assert_eq!(t.effects[1], SessionEffect::SetRunId("abc123".into()));
        assert!(!t.closes_connection());
    }

    #[test]
    fn started_without_string_run_id_is_only_logged() {
        let t = handle_input(SessionState::Streaming, message(r#"{"type":"started"}"#));
        assert_eq!(t.effects.len(), 1);
        assert!(matches!(t.effects[0], SessionEffect::AppendLog(_)));
    }

    #[test]
    fn done_closes_and_sets_result() {
        let t = handle_input(
            SessionState::Streaming,
            message(r#"{"type":"done","result":{"ok":true}}"#),
        );
        assert_eq!(t.next, SessionState::Idle);
        assert!(t.closes_connection());
        assert_eq!(
            t.effects.last(),
            Some(&SessionEffect::SetResult(json!({"ok": true})))
        );
    }

    #[test]
    fn error_event_closes_without_result() {
        let t = handle_input(
            SessionState::Streaming,
            message(r#"{"type":"error","error":"boom"}"#),
        );
        assert_eq!(t.next, SessionState::Idle);
        assert!(t.closes_connection());
        assert!(
            !t.effects
                .iter()
                .any(|e| matches!(e, SessionEffect::SetResult(_)))
        );
    }

    #[test]
    fn malformed_payload_appends_parse_error_and_keeps_streaming() {
        let t = handle_input(SessionState::Streaming, message("not-json"));
        assert_eq!(t.next, SessionState::Streaming);
        assert_eq!(
            t.effects,
            vec![SessionEffect::AppendLog(LogEvent::parse_error("not-json"))]
        );
    }

    #[test]
    fn truncated_json_keeps_raw_payload_verbatim() {
        let raw = r#"{"type":"step","iteration":"#;
        let t = handle_input(SessionState::Streaming, message(raw));
        let [SessionEffect::AppendLog(entry)] = t.effects.as_slice() else {
            panic!("expected a single log entry, got {:?}", t.effects);
        };
        assert_eq!(entry.kind(), EventKind::ParseError);
        assert_eq!(entry.as_value()["raw"], raw);
        assert_eq!(t.next, SessionState::Streaming);
    }

    #[test]
    fn other_event_types_pass_through() {
        let raw = r#"{"type":"cancelled","run_id":"abc123"}"#;
        let t = handle_input(SessionState::Streaming, message(raw));
        assert_eq!(t.next, SessionState::Streaming);
        assert_eq!(
            t.effects,
            vec![SessionEffect::AppendLog(LogEvent::parse(raw).expect("json"))]
        );
    }

    #[test]
    fn transport_error_appends_sse_error_and_goes_idle() {
        let t = handle_input(
            SessionState::Streaming,
            StreamInput::TransportError("connection reset".into()),
        );
        assert_eq!(t.next, SessionState::Idle);
        assert_eq!(
            t.effects,
            vec![
                SessionEffect::AppendLog(LogEvent::sse_error("connection reset")),
                SessionEffect::CloseConnection,
            ]
        );
    }

    #[test]
    fn inputs_while_idle_are_ignored() {
        let t = handle_input(SessionState::Idle, message(r#"{"type":"done"}"#));
        assert_eq!(t, Transition::stay(SessionState::Idle));
    }
}
