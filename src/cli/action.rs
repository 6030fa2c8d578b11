//! Manual action command handler.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use loopclaw::agent::{AgentEngine, CycleOutcome};

use super::common::{load_profile, print_status};

/// Run one task, or one connection action, through the engine's gate.
pub(crate) async fn cmd_action(
    agent: &str,
    connection: Option<String>,
    action: Option<String>,
    rest: Vec<String>,
) -> Result<()> {
    let profile = load_profile(agent)?;
    let engine = AgentEngine::from_profile(profile)
        .with_context(|| format!("Failed to build agent '{}'", agent))?;

    let outcome = match (connection, action) {
        (Some(connection), Some(action)) => {
            let args = rest.into_iter().map(Value::String).collect();
            engine
                .perform_direct(&connection, &action, args)
                .await
                .with_context(|| format!("Failed to perform {} on {}", action, connection))?
        }
        _ => {
            let task = match rest.as_slice() {
                [task] => task,
                [] => bail!("Provide a task name, or --connection and --action"),
                _ => bail!("Extra arguments are only accepted with --connection and --action"),
            };
            engine
                .run_once(Some(task.as_str()))
                .await
                .with_context(|| format!("Failed to run task '{}'", task))?
        }
    };

    match &outcome {
        CycleOutcome::Completed { task, payload, .. } => {
            println!("[OK] {}", task);
            println!("{}", serde_json::to_string_pretty(payload)?);
        }
        CycleOutcome::Ineligible {
            task,
            remaining_secs,
            ..
        } => println!("[WAIT] {} is cooling down ({}s left)", task, remaining_secs),
        CycleOutcome::Rejected { task, reason, .. } => {
            println!("[REJECTED] {}: {}", task, reason)
        }
        CycleOutcome::Failed { task, error, .. } | CycleOutcome::Skipped { task, error } => {
            println!("[FAILED] {}: {}", task, error)
        }
        CycleOutcome::Interrupted { task, .. } => println!("[INTERRUPTED] {}", task),
        CycleOutcome::Idle => println!("No eligible task"),
    }
    println!();
    print_status(&engine.status())
}
