//! Agent listing command handler.

use std::path::PathBuf;

use anyhow::{Context, Result};

use loopclaw::config::AgentProfile;

/// List agent files in the agents directory.
pub(crate) fn cmd_agents(dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(AgentProfile::agents_dir);
    let names = AgentProfile::list(&dir)
        .with_context(|| format!("Failed to read agents directory {}", dir.display()))?;

    if names.is_empty() {
        println!("No agents found in {}", dir.display());
        return Ok(());
    }

    println!("Agents in {}", dir.display());
    println!();
    for name in &names {
        println!("  {}", name);
    }
    println!();
    println!("{} agent(s) found.", names.len());
    Ok(())
}
