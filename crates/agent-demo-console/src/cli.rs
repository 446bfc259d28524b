use agent_demo_client::{ClientConfig, ClientError};
use clap::{Parser, Subcommand};

/// Terminal front end for the hybrid agent workflow demo
#[derive(Debug, Parser)]
#[command(name = "agent-demo", version, about = "Terminal front end for the hybrid agent workflow demo")]
pub struct Cli {
    /// Workflow backend base URL (overrides AGENT_DEMO_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Ask the backend to use its OpenAI adapter for /run-workflow
    #[arg(long, global = true)]
    pub use_openai: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Render the view and read run/stream/cancel commands from stdin (default)
    Interactive,
    /// Run the workflow once and print the result
    Run,
    /// Stream one workflow run, re-rendering after every event
    Stream {
        /// Request cancellation as soon as the run id is known
        #[arg(long)]
        cancel_after_start: bool,
    },
    /// Request cancellation of a run by id
    Cancel {
        /// Run id reported by the `started` event
        run_id: String,
    },
    /// Check backend health
    Health,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Interactive)
    }

    /// Environment config with command-line flags layered on top.
    pub fn client_config<F>(&self, lookup: F) -> Result<ClientConfig, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ClientConfig::from_lookup(lookup)?;
        if let Some(base_url) = &self.base_url {
            config = config.base_url(base_url.clone());
        }
        if self.use_openai {
            config = config.use_openai(true);
        }
        config.validate()?;
        Ok(config)
    }
}
