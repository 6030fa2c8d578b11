//! Shared CLI helpers used across multiple command handlers.

use anyhow::{Context, Result};

use loopclaw::agent::AgentStatus;
use loopclaw::config::AgentProfile;

/// Load and validate an agent profile by name or path.
pub(crate) fn load_profile(agent: &str) -> Result<AgentProfile> {
    AgentProfile::load(agent).with_context(|| format!("Failed to load agent '{}'", agent))
}

/// Print a status snapshot as pretty JSON.
pub(crate) fn print_status(status: &AgentStatus) -> Result<()> {
    let json = serde_json::to_string_pretty(status).context("Failed to serialize status")?;
    println!("{}", json);
    Ok(())
}
