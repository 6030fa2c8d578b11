//! Agent file check command handler.

use anyhow::{bail, Context, Result};

use loopclaw::config::validate::{self, DiagnosticLevel};
use loopclaw::config::AgentProfile;

/// Validate an agent file; errors make the command fail.
pub(crate) fn cmd_validate(agent: &str) -> Result<()> {
    let path = AgentProfile::resolve_path(agent, &AgentProfile::agents_dir());
    println!("Agent file: {}", path.display());

    if !path.exists() {
        bail!("Agent file not found at path: {}", path.display());
    }

    let content = std::fs::read_to_string(&path).context("Failed to read agent file")?;

    let raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            println!("[ERROR] Invalid JSON: {}", e);
            bail!("Agent file is not valid JSON");
        }
    };

    let diagnostics = validate::validate_agent_file(&raw);
    for diag in &diagnostics {
        println!("{}", diag);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Warn)
        .count();

    if errors == 0 && warnings == 0 {
        println!("\nAgent file looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }
    if validate::has_errors(&diagnostics) {
        bail!("Agent file has {} error(s)", errors);
    }
    Ok(())
}
