use std::sync::Arc;

use agent_demo_client::{Action, Renderer, ViewController, WorkflowApi};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tracing::debug;

const HELP: &str = "commands: r/run, s/stream, c/cancel, q/quit, h/help";

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Action(Action),
    Redraw,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Option<Input> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Some(Input::Redraw),
        "r" | "run" => Some(Input::Action(Action::Run)),
        "s" | "stream" => Some(Input::Action(Action::StreamRun)),
        "c" | "cancel" => Some(Input::Action(Action::Cancel)),
        "h" | "help" | "?" => Some(Input::Help),
        "q" | "quit" | "exit" => Some(Input::Quit),
        _ => None,
    }
}

/// Interactive session: commands from `input`, a re-render after every
/// state change. Ends on `quit` or end of input without waiting for
/// outstanding requests; an open event stream is closed on the way out.
pub async fn interactive<R>(
    api: Arc<dyn WorkflowApi>,
    input: R,
    renderer: &mut dyn Renderer,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut controller = ViewController::new(api);
    let mut lines = input.lines();
    renderer.render(controller.state())?;
    eprintln!("{HELP}");

    loop {
        let busy = controller.is_busy();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(event = "console.input_closed", domain = "console");
                    break;
                };
                match parse_input(&line) {
                    Some(Input::Action(action)) => controller.dispatch(action),
                    Some(Input::Redraw) => {}
                    Some(Input::Help) => {
                        eprintln!("{HELP}");
                        continue;
                    }
                    Some(Input::Quit) => break,
                    None => {
                        eprintln!("unknown command {:?}; {HELP}", line.trim());
                        continue;
                    }
                }
            }
            progressed = controller.step(), if busy => {
                if !progressed {
                    continue;
                }
            }
        }
        renderer.render(controller.state())?;
    }

    if controller.is_busy() {
        debug!(event = "console.exit_while_busy", domain = "console");
    }
    // dropping the controller aborts the stream task
    drop(controller);
    Ok(())
}

/// Runs the workflow once and renders the final view.
pub async fn run_once(api: Arc<dyn WorkflowApi>, renderer: &mut dyn Renderer) -> anyhow::Result<()> {
    let mut controller = ViewController::new(api);
    controller.dispatch(Action::Run);
    controller.settle().await;
    renderer.render(controller.state())?;
    Ok(())
}

/// Streams one session to completion, rendering after each event.
pub async fn stream_once(
    api: Arc<dyn WorkflowApi>,
    renderer: &mut dyn Renderer,
    cancel_after_start: bool,
) -> anyhow::Result<()> {
    let mut controller = ViewController::new(api);
    controller.dispatch(Action::StreamRun);
    renderer.render(controller.state())?;
    let mut cancel_sent = false;
    while controller.step().await {
        if cancel_after_start && !cancel_sent && controller.state().can_cancel() {
            controller.dispatch(Action::Cancel);
            cancel_sent = true;
        }
        renderer.render(controller.state())?;
    }
    Ok(())
}
