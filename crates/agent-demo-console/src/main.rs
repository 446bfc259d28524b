//! `agent-demo`: terminal front end for the hybrid agent workflow demo.
//!
//! Talks to the workflow backend (default `http://127.0.0.1:8000`) and renders
//! the same view as the web demo: a Run control with its result, a Stream Run
//! control with the streamed log, and Cancel for the captured run id.

mod cli;
mod console;

use std::sync::Arc;

use agent_demo_client::{HttpWorkflowApi, TextRenderer, WorkflowApi, init_observability};
use clap::Parser as _;
use tracing::info;

use crate::cli::{Cli, Command};

fn load_env() {
    let _ = dotenvy::from_path(std::path::Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_observability();

    let cli = Cli::parse();
    let config = cli.client_config(|key| std::env::var(key).ok())?;
    info!(event = "console.started", domain = "console", base_url = %config.base_url);
    let http = Arc::new(HttpWorkflowApi::new(config)?);
    let mut renderer = TextRenderer::new(std::io::stdout());

    match cli.command() {
        Command::Interactive => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            console::interactive(http, stdin, &mut renderer).await?;
        }
        Command::Run => console::run_once(http, &mut renderer).await?,
        Command::Stream { cancel_after_start } => {
            console::stream_once(http, &mut renderer, cancel_after_start).await?;
        }
        Command::Cancel { run_id } => {
            let body = http.cancel_run(&run_id).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Health => {
            let health = http.health().await?;
            println!("{}", health.status);
        }
    }
    Ok(())
}
