//! Observable state of an agent loop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Where the loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Not running
    Stopped,
    /// Between cycles, checking for a stop request
    Idle,
    /// Building the candidate set and drawing a task
    Selecting,
    /// An action is in flight
    Dispatching,
    /// Sleeping for the loop delay
    Cooling,
}

/// What one cycle (or one manual run) did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// No task was eligible
    Idle,
    /// The action succeeded
    Completed {
        task: String,
        connection: String,
        action: String,
        payload: Value,
    },
    /// Manual run of a task still cooling down; nothing was attempted
    Ineligible {
        task: String,
        connection: String,
        action: String,
        remaining_secs: u64,
    },
    /// Moderation rejected the content; the attempt counts
    Rejected {
        task: String,
        connection: String,
        action: String,
        reason: String,
    },
    /// Rate-limited or transient failure; the attempt counts
    Failed {
        task: String,
        connection: String,
        action: String,
        error: String,
    },
    /// Configuration problem; nothing was attempted
    Skipped { task: String, error: String },
    /// Stop was requested while the action was in flight
    Interrupted {
        task: String,
        connection: String,
        action: String,
    },
}

impl CycleOutcome {
    /// Task the outcome refers to, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            CycleOutcome::Idle => None,
            CycleOutcome::Completed { task, .. }
            | CycleOutcome::Ineligible { task, .. }
            | CycleOutcome::Rejected { task, .. }
            | CycleOutcome::Failed { task, .. }
            | CycleOutcome::Skipped { task, .. }
            | CycleOutcome::Interrupted { task, .. } => Some(task),
        }
    }

    /// Whether an attempt was stamped in the rate tracker.
    pub fn attempted(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Completed { .. }
                | CycleOutcome::Rejected { .. }
                | CycleOutcome::Failed { .. }
                | CycleOutcome::Interrupted { .. }
        )
    }

    /// Error text worth surfacing in status, if any.
    pub fn error(&self) -> Option<String> {
        match self {
            CycleOutcome::Rejected { reason, .. } => Some(format!("rejected: {}", reason)),
            CycleOutcome::Failed { error, .. } | CycleOutcome::Skipped { error, .. } => {
                Some(error.clone())
            }
            _ => None,
        }
    }
}

/// Last dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastAction {
    pub task: String,
    pub connection: String,
    pub action: String,
    pub at: DateTime<Utc>,
}

/// Snapshot returned by the engine's `status()`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub agent: String,
    pub state: LoopState,
    pub running: bool,
    /// Cycles run by the loop since it was created
    pub cycles: u64,
    /// Failed or skipped cycles in a row
    pub consecutive_failures: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub last_action: Option<LastAction>,
    pub last_outcome: Option<CycleOutcome>,
    pub last_error: Option<String>,
}

impl AgentStatus {
    pub fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            state: LoopState::Stopped,
            running: false,
            cycles: 0,
            consecutive_failures: 0,
            started_at: None,
            last_action: None,
            last_outcome: None,
            last_error: None,
        }
    }
}
