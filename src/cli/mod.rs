//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod action;
pub mod agents;
pub mod common;
pub mod config;
pub mod connections;
pub mod run;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use loopclaw::config::{AgentProfile, LoggingConfig};

#[derive(Parser)]
#[command(name = "loopclaw")]
#[command(version)]
#[command(about = "Autonomous agent loop with weighted task scheduling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the autonomous loop (Ctrl+C stops it)
    Run {
        /// Agent name (from the agents directory) or path to an agent file
        #[arg(short, long)]
        agent: String,
    },
    /// Run a single task or connection action now
    Action {
        /// Agent name or path to an agent file
        #[arg(short, long)]
        agent: String,
        /// Connection to act on (requires --action)
        #[arg(long, requires = "action_name")]
        connection: Option<String>,
        /// Action to perform on --connection
        #[arg(long = "action", id = "action_name", requires = "connection")]
        action_name: Option<String>,
        /// Task name, or the action's arguments when --connection is given
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        rest: Vec<String>,
    },
    /// List connections, their readiness and action usage
    Connections {
        /// Agent name or path to an agent file
        #[arg(short, long)]
        agent: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List agent files in the agents directory
    Agents {
        /// Agents directory (defaults to LOOPCLAW_AGENTS_DIR or ./agents)
        #[arg(long)]
        dir: Option<std::path::PathBuf>,
    },
    /// Check an agent file for errors and warnings
    Validate {
        /// Agent name or path to an agent file
        #[arg(short, long)]
        agent: String,
    },
    /// Show version information
    Version,
}

impl Commands {
    fn agent(&self) -> Option<&str> {
        match self {
            Commands::Run { agent }
            | Commands::Action { agent, .. }
            | Commands::Connections { agent, .. }
            | Commands::Validate { agent } => Some(agent.as_str()),
            Commands::Agents { .. } | Commands::Version => None,
        }
    }
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    // Connection credentials usually live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Respect the agent's logging section when it loads; fall back to
    // defaults so `validate` can still report on a broken file.
    let logging_cfg = cli
        .command
        .as_ref()
        .and_then(Commands::agent)
        .and_then(|agent| AgentProfile::load(agent).ok())
        .map(|p| p.logging)
        .unwrap_or_else(LoggingConfig::default);
    loopclaw::utils::logging::init_logging(&logging_cfg)
        .with_context(|| "Failed to initialize logging")?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Run { agent }) => {
            run::cmd_run(&agent).await?;
        }
        Some(Commands::Action {
            agent,
            connection,
            action_name,
            rest,
        }) => {
            action::cmd_action(&agent, connection, action_name, rest).await?;
        }
        Some(Commands::Connections { agent, json }) => {
            connections::cmd_connections(&agent, json)?;
        }
        Some(Commands::Agents { dir }) => {
            agents::cmd_agents(dir)?;
        }
        Some(Commands::Validate { agent }) => {
            config::cmd_validate(&agent)?;
        }
    }

    Ok(())
}

/// Display version information
fn cmd_version() {
    println!("loopclaw {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Autonomous agent loop with weighted task scheduling");
}
