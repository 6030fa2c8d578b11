//! Connection listing command handler.

use anyhow::{Context, Result};

use loopclaw::connections::build_registry;

use super::common::load_profile;

/// List an agent's connections with readiness and action usage.
pub(crate) fn cmd_connections(agent: &str, json: bool) -> Result<()> {
    let profile = load_profile(agent)?;
    let registry = build_registry(&profile)
        .with_context(|| format!("Failed to build connections for '{}'", agent))?;
    let summaries = registry.list_connections();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No connections configured for '{}'.", profile.name);
        return Ok(());
    }

    println!("Connections for '{}'", profile.name);
    println!();
    for summary in &summaries {
        let state = if summary.configured { "ready" } else { "not configured" };
        let llm = if summary.llm { " [llm]" } else { "" };
        println!("  {:<20} {}{}", summary.name, state, llm);
        for action in &summary.actions {
            if action.description.is_empty() {
                println!("      {} {}", action.name, action.usage);
            } else {
                println!(
                    "      {} {}  # {}",
                    action.name, action.usage, action.description
                );
            }
        }
    }
    println!();
    let ready = summaries.iter().filter(|s| s.configured).count();
    println!("{} of {} connection(s) ready.", ready, summaries.len());
    Ok(())
}
