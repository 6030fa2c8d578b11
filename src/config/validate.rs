//! Agent file validation with unknown field detection.

use serde_json::Value;
use std::collections::HashSet;

use super::AgentProfile;

/// Known top-level agent file field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "name",
    "bio",
    "traits",
    "examples",
    "loop_delay",
    "moderated",
    "tasks",
    "config",
    "use_time_based_weights",
    "time_based_multipliers",
    "time_periods",
    "utc_offset_hours",
    "llm",
    "moderation",
    "logging",
    "seed",
];

/// Known fields for each task entry.
const KNOWN_TASK_FIELDS: &[&str] = &["name", "weight", "connection", "action", "args", "prompt"];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            matrix[i + 1][j + 1] = std::cmp::min(
                std::cmp::min(matrix[i][j + 1] + 1, matrix[i + 1][j] + 1),
                matrix[i][j] + cost,
            );
        }
    }
    matrix[a.len()][b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_field(key: &str, path: String, known: &[&str]) -> Diagnostic {
    let msg = match suggest_field(key, known) {
        Some(suggestion) => format!("Unknown field '{}' ({})", key, suggestion),
        None => format!("Unknown field '{}'", key),
    };
    Diagnostic::new(DiagnosticLevel::Error, path, msg)
}

/// Validate a raw agent file: field names first, then profile semantics.
pub fn validate_agent_file(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "",
                "Agent file must be a JSON object",
            ));
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let known_set: HashSet<&str> = KNOWN_TOP_LEVEL.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if !known_set.contains(key.as_str()) {
            has_unknown = true;
            diagnostics.push(unknown_field(key, key.clone(), KNOWN_TOP_LEVEL));
        }
    }

    if let Some(tasks) = obj.get("tasks").and_then(|v| v.as_array()) {
        let known_set: HashSet<&str> = KNOWN_TASK_FIELDS.iter().copied().collect();
        for (i, task) in tasks.iter().enumerate() {
            if let Some(task_obj) = task.as_object() {
                for key in task_obj.keys() {
                    if !known_set.contains(key.as_str()) {
                        has_unknown = true;
                        diagnostics.push(unknown_field(
                            key,
                            format!("tasks[{}].{}", i, key),
                            KNOWN_TASK_FIELDS,
                        ));
                    }
                }
            }
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    match serde_json::from_value::<AgentProfile>(raw.clone()) {
        Ok(profile) => diagnostics.extend(validate_profile(&profile)),
        Err(e) => diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            format!("Does not parse as an agent profile: {}", e),
        )),
    }

    diagnostics
}

/// Semantic checks on a parsed profile.
pub fn validate_profile(profile: &AgentProfile) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if let Err(e) = profile.validate() {
        diagnostics.push(Diagnostic::new(DiagnosticLevel::Error, "", e.to_string()));
    }

    if !profile.has_schedulable_task() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "tasks",
            "No task has a positive weight; the loop will stay idle",
        ));
    }

    let mut seen = HashSet::new();
    for task in &profile.tasks {
        if !seen.insert(task.name.as_str()) {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                format!("tasks.{}", task.name),
                "Duplicate task name; manual runs pick the first entry",
            ));
        }
        if let Some(conn) = &task.connection {
            if profile.connection_settings(conn).is_none() {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Warn,
                    format!("tasks.{}.connection", task.name),
                    format!("Connection '{}' has no config entry", conn),
                ));
            }
        }
    }

    if profile.use_time_based_weights {
        let periods: HashSet<&str> = profile.time_periods.iter().map(|p| p.name.as_str()).collect();
        for name in profile.time_based_multipliers.keys() {
            if !periods.contains(name.as_str()) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticLevel::Warn,
                    format!("time_based_multipliers.{}", name),
                    "No time period with this name; multiplier never applies",
                ));
            }
        }
    }

    if profile.moderated && profile.moderation.blocked_terms.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "moderation.blocked_terms",
            "Moderation enabled with no blocked terms; built-in moderator approves everything",
        ));
    }

    diagnostics
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.level == DiagnosticLevel::Error)
}
