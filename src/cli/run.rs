//! Loop command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use loopclaw::agent::AgentEngine;

use super::common::{load_profile, print_status};

/// Run the agent loop until Ctrl+C or a fatal error.
pub(crate) async fn cmd_run(agent: &str) -> Result<()> {
    let profile = load_profile(agent)?;
    let name = profile.name.clone();
    let engine = Arc::new(
        AgentEngine::from_profile(profile)
            .with_context(|| format!("Failed to build agent '{}'", name))?,
    );

    let ready = engine.registry().list_ready();
    println!("Agent '{}' starting with {} ready connection(s).", name, ready.len());
    println!("Press Ctrl+C to stop.");
    println!();

    let mut handle = engine.spawn().context("Failed to start agent loop")?;

    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        signal = tokio::signal::ctrl_c() => {
            signal.with_context(|| "Failed to listen for Ctrl+C")?;
            None
        }
    };
    let result = match finished {
        Some(joined) => joined,
        None => {
            println!();
            println!("Shutting down...");
            info!(agent = %name, "Ctrl+C received");
            engine.stop();
            handle.await
        }
    };

    print_status(&engine.status())?;
    result
        .context("Agent loop task panicked")?
        .with_context(|| format!("Agent '{}' stopped on a fatal error", name))
}
