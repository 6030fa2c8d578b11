//! Configuration type definitions for LoopClaw
//!
//! This module defines the agent profile and every nested section of an
//! agent file. All types implement serde traits for JSON serialization and
//! have sensible defaults.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default seconds between agent cycles.
pub const DEFAULT_LOOP_DELAY_SECS: u64 = 900;

/// Default connection used to generate content for prompted tasks.
pub const DEFAULT_LLM_CONNECTION: &str = "openai";

/// Default action used to generate content for prompted tasks.
pub const DEFAULT_LLM_ACTION: &str = "generate-text";

// ============================================================================
// Agent Profile
// ============================================================================

/// Immutable per-run configuration of one agent.
///
/// Loaded once from an agent file, then shared read-only by the scheduler,
/// the rate tracker and the execution engine. Reloading means restarting
/// the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    /// Agent identity
    pub name: String,
    /// Descriptive lines handed to content generation
    pub bio: Vec<String>,
    /// Personality traits handed to content generation
    pub traits: Vec<String>,
    /// Example outputs handed to content generation
    pub examples: Vec<String>,
    /// Seconds to sleep between cycles (must be > 0)
    pub loop_delay: u64,
    /// Route user-facing content through moderation before dispatch
    pub moderated: bool,
    /// Schedulable tasks with their base weights
    pub tasks: Vec<TaskConfig>,
    /// Per-connection configuration bags
    pub config: Vec<ConnectionSettings>,
    /// Apply time-of-day multipliers to task weights
    pub use_time_based_weights: bool,
    /// Period name -> weight multiplier
    pub time_based_multipliers: HashMap<String, f64>,
    /// Named hour ranges used to pick a multiplier
    pub time_periods: Vec<TimePeriod>,
    /// Fixed UTC offset for period buckets; host local time when unset
    pub utc_offset_hours: Option<i32>,
    /// Connection/action that turns task prompts into content
    pub llm: Option<LlmBinding>,
    /// Built-in moderation settings
    pub moderation: ModerationConfig,
    /// Logging output settings
    pub logging: LoggingConfig,
    /// Fixed RNG seed for reproducible task selection
    pub seed: Option<u64>,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            bio: Vec::new(),
            traits: Vec::new(),
            examples: Vec::new(),
            loop_delay: DEFAULT_LOOP_DELAY_SECS,
            moderated: true,
            tasks: Vec::new(),
            config: Vec::new(),
            use_time_based_weights: false,
            time_based_multipliers: HashMap::new(),
            time_periods: TimePeriod::defaults(),
            utc_offset_hours: None,
            llm: None,
            moderation: ModerationConfig::default(),
            logging: LoggingConfig::default(),
            seed: None,
        }
    }
}

impl AgentProfile {
    /// Sleep between cycles.
    pub fn loop_delay(&self) -> Duration {
        Duration::from_secs(self.loop_delay)
    }

    /// Look up a task by name.
    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Configuration bag for a connection, if present.
    pub fn connection_settings(&self, name: &str) -> Option<&ConnectionSettings> {
        self.config.iter().find(|c| c.name == name)
    }

    /// Minimum spacing between two attempts of `action` on `connection`.
    ///
    /// Connections without a configuration bag have no cooldown.
    pub fn min_interval(&self, connection: &str, action: &str) -> Duration {
        self.connection_settings(connection)
            .map(|c| c.min_interval(action))
            .unwrap_or(Duration::ZERO)
    }

    /// Whether at least one task can ever be selected.
    pub fn has_schedulable_task(&self) -> bool {
        self.tasks.iter().any(|t| t.weight > 0.0)
    }

    /// Content-generation binding, falling back to the default LLM action.
    pub fn llm_binding(&self) -> LlmBinding {
        self.llm.clone().unwrap_or_default()
    }

    /// Multiplier configured for a period; unmatched periods weigh 1.0.
    pub fn multiplier_for(&self, period: Option<&str>) -> f64 {
        period
            .and_then(|p| self.time_based_multipliers.get(p))
            .copied()
            .unwrap_or(1.0)
    }

    /// System prompt assembled from the descriptive fields.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::new();
        if !self.bio.is_empty() {
            prompt.push_str(&self.bio.join(" "));
            prompt.push_str("\n\n");
        }
        if !self.traits.is_empty() {
            prompt.push_str("Your key traits are:\n");
            for t in &self.traits {
                prompt.push_str("- ");
                prompt.push_str(t);
                prompt.push('\n');
            }
            prompt.push('\n');
        }
        if !self.examples.is_empty() {
            prompt.push_str("Here are some examples of your style (Please avoid repeating any of these):\n");
            for e in &self.examples {
                prompt.push_str("- ");
                prompt.push_str(e);
                prompt.push('\n');
            }
        }
        prompt.trim_end().to_string()
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// A scheduler-visible unit of work with a base weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name; doubles as the action name when no explicit binding is set
    pub name: String,
    /// Base selection weight (>= 0)
    #[serde(default)]
    pub weight: f64,
    /// Explicit connection binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Explicit action binding (defaults to the task name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Fixed positional arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    /// Prompt for the LLM binding; generated text is appended to `args`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl TaskConfig {
    /// Create a task with only a name and weight.
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            connection: None,
            action: None,
            args: Vec::new(),
            prompt: None,
        }
    }

    /// Bind the task to an explicit connection/action pair.
    pub fn bound_to(mut self, connection: &str, action: &str) -> Self {
        self.connection = Some(connection.to_string());
        self.action = Some(action.to_string());
        self
    }

    /// Set fixed positional arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Ask the LLM binding for content before dispatch.
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = Some(prompt.to_string());
        self
    }

    /// Action name this task dispatches.
    pub fn action_name(&self) -> &str {
        self.action.as_deref().unwrap_or(&self.name)
    }
}

// ============================================================================
// Connections
// ============================================================================

/// Opaque per-connection configuration bag.
///
/// Only the interval fields are interpreted by the core; everything else is
/// kept in `extra` for the connection implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection name (registry key)
    pub name: String,
    /// Implementation kind ("console", "webhook"); defaults to the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Per-action minimum interval in seconds
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub intervals: HashMap<String, u64>,
    /// Interval in seconds for actions without an explicit entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_interval: Option<u64>,
    /// Everything else, consumed by the connection itself
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConnectionSettings {
    /// Create an empty bag for `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set the implementation kind.
    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    /// Set the minimum interval for one action.
    pub fn with_interval(mut self, action: &str, secs: u64) -> Self {
        self.intervals.insert(action.to_string(), secs);
        self
    }

    /// Set an opaque field.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Implementation kind, falling back to the connection name.
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }

    /// Minimum spacing between two attempts of `action`.
    pub fn min_interval(&self, action: &str) -> Duration {
        let secs = self
            .intervals
            .get(action)
            .copied()
            .or(self.default_interval)
            .unwrap_or(0);
        Duration::from_secs(secs)
    }

    /// String field from the opaque bag.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    /// Unsigned integer field from the opaque bag.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(|v| v.as_u64())
    }
}

/// Connection/action pair used for content generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmBinding {
    pub connection: String,
    #[serde(default = "default_llm_action")]
    pub action: String,
}

fn default_llm_action() -> String {
    DEFAULT_LLM_ACTION.to_string()
}

impl Default for LlmBinding {
    fn default() -> Self {
        Self {
            connection: DEFAULT_LLM_CONNECTION.to_string(),
            action: DEFAULT_LLM_ACTION.to_string(),
        }
    }
}

// ============================================================================
// Time-of-day periods
// ============================================================================

/// Named half-open hour range `[start_hour, end_hour)`.
///
/// A range whose start is after its end wraps past midnight. Equal bounds
/// match no hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimePeriod {
    pub fn new(name: &str, start_hour: u32, end_hour: u32) -> Self {
        Self {
            name: name.to_string(),
            start_hour,
            end_hour,
        }
    }

    /// Built-in buckets used when an agent file does not define any.
    pub fn defaults() -> Vec<TimePeriod> {
        vec![TimePeriod::new("night", 1, 6), TimePeriod::new("day", 8, 20)]
    }

    /// Whether `hour` (0-23) falls inside this period.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else if self.start_hour > self.end_hour {
            hour >= self.start_hour || hour < self.end_hour
        } else {
            false
        }
    }
}

// ============================================================================
// Moderation
// ============================================================================

/// Settings for the built-in keyword moderator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Case-insensitive terms that cause a rejection
    pub blocked_terms: Vec<String>,
}

// ============================================================================
// Logging
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default tracing pretty-print
    Pretty,
    /// Compact `target message {fields}` lines
    #[default]
    Component,
    /// Structured JSON lines
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
