use std::fmt::Write as _;
use std::io;

use serde_json::Value;

use crate::event::LogEvent;
use crate::view::ViewState;

/// Receives the view after every state change.
pub trait Renderer: Send {
    fn render(&mut self, view: &ViewState) -> io::Result<()>;
}

/// Writes the plain-text rendering to any `io::Write`.
pub struct TextRenderer<W> {
    out: W,
}

impl<W: io::Write + Send> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write + Send> Renderer for TextRenderer<W> {
    fn render(&mut self, view: &ViewState) -> io::Result<()> {
        self.out.write_all(render_view(view).as_bytes())?;
        self.out.flush()
    }
}

/// Renders the whole view as text.
pub fn render_view(view: &ViewState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Hybrid Agent Demo ==");
    let _ = writeln!(out, "{}", run_button(view));
    let _ = writeln!(out);
    let _ = writeln!(out, "-- Result --");
    match view.result().filter(|r| !r.is_null()) {
        Some(result) => {
            let _ = writeln!(out, "{}", pretty(result));
        }
        None => {
            let _ = writeln!(out, "No results yet.");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "-- Streamed Logs --");
    let _ = writeln!(out, "{} {}", stream_button(view), cancel_button(view));
    if view.logs().is_empty() {
        let _ = writeln!(out, "No logs");
    }
    for event in view.logs() {
        let _ = writeln!(out, "{}", log_heading(event));
        for line in pretty(event.as_value()).lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
    out
}

fn run_button(view: &ViewState) -> &'static str {
    if view.running() {
        "[Running...]"
    } else {
        "[Run Workflow]"
    }
}

fn stream_button(view: &ViewState) -> &'static str {
    if view.streaming() {
        "[Streaming...]"
    } else {
        "[Stream Run]"
    }
}

fn cancel_button(view: &ViewState) -> String {
    match view.run_id() {
        Some(run_id) => format!("[Cancel {run_id}]"),
        None => "(Cancel)".to_string(),
    }
}

/// `* <type>` plus `(iter N)` when the event carries an iteration.
pub fn log_heading(event: &LogEvent) -> String {
    let name = event.type_name().unwrap_or("?");
    match event.iteration() {
        Some(iteration) => format!("* {name} (iter {iteration})"),
        None => format!("* {name}"),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
