//! Agent profile loading for LoopClaw
//!
//! Agent files are JSON documents kept one per agent in an agents directory
//! (`./agents` by default). The core never parses them itself: this module
//! turns a file into a validated, read-only [`AgentProfile`].

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LoopError, Result};

impl AgentProfile {
    /// Returns the agents directory (`LOOPCLAW_AGENTS_DIR` or `./agents`).
    pub fn agents_dir() -> PathBuf {
        std::env::var("LOOPCLAW_AGENTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("agents"))
    }

    /// Resolve an agent reference to a file path.
    ///
    /// Anything that looks like a path (contains a separator or ends in
    /// `.json`) is used as-is; a bare name maps to `<dir>/<name>.json`.
    pub fn resolve_path(reference: &str, dir: &Path) -> PathBuf {
        let candidate = Path::new(reference);
        if reference.ends_with(".json") || candidate.components().count() > 1 {
            candidate.to_path_buf()
        } else {
            dir.join(format!("{}.json", reference))
        }
    }

    /// Load an agent by name or path with environment overrides applied.
    pub fn load(reference: &str) -> Result<Self> {
        Self::load_from_path(&Self::resolve_path(reference, &Self::agents_dir()))
    }

    /// Load an agent file from a specific path.
    ///
    /// Unlike the global config of a long-running service, a missing agent
    /// file is an error: there is no meaningful default agent.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoopError::Config(format!(
                "Agent file not found at path: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let mut profile: AgentProfile = serde_json::from_str(&content)?;
        profile.apply_env_overrides();
        profile.validate()?;
        debug!(agent = %profile.name, path = %path.display(), "Loaded agent profile");
        Ok(profile)
    }

    /// Write this profile to `<dir>/<name>.json`, creating the directory.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.name));
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// List agent names (file stems) in `dir`, sorted.
    pub fn list(dir: &Path) -> Result<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                // "general" holds shared defaults, not an agent
                if stem != "general" {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Apply environment variable overrides to the profile.
    ///
    /// Environment variables follow the pattern: LOOPCLAW_FIELD
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOOPCLAW_LOOP_DELAY") {
            if let Ok(v) = val.parse() {
                self.loop_delay = v;
            }
        }
        if let Ok(val) = std::env::var("LOOPCLAW_MODERATED") {
            if let Ok(v) = val.parse() {
                self.moderated = v;
            }
        }
        if let Ok(val) = std::env::var("LOOPCLAW_USE_TIME_BASED_WEIGHTS") {
            if let Ok(v) = val.parse() {
                self.use_time_based_weights = v;
            }
        }
        if let Ok(val) = std::env::var("LOOPCLAW_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Check the invariants the loop relies on.
    ///
    /// Errors here are structural: a profile that fails validation never
    /// reaches the execution engine.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LoopError::Config("name must not be empty".into()));
        }
        if self.loop_delay == 0 {
            return Err(LoopError::Config("loop_delay must be greater than 0".into()));
        }
        for task in &self.tasks {
            if !task.weight.is_finite() || task.weight < 0.0 {
                return Err(LoopError::Config(format!(
                    "task '{}' has invalid weight {}",
                    task.name, task.weight
                )));
            }
        }
        for (period, multiplier) in &self.time_based_multipliers {
            if !multiplier.is_finite() || *multiplier < 0.0 {
                return Err(LoopError::Config(format!(
                    "time multiplier '{}' has invalid value {}",
                    period, multiplier
                )));
            }
        }
        for period in &self.time_periods {
            if period.start_hour > 23 || period.end_hour > 24 {
                return Err(LoopError::Config(format!(
                    "time period '{}' has hours outside 0-24",
                    period.name
                )));
            }
        }
        if let Some(offset) = self.utc_offset_hours {
            if !(-23..=23).contains(&offset) {
                return Err(LoopError::Config(format!(
                    "utc_offset_hours {} outside -23..=23",
                    offset
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for conn in &self.config {
            if !seen.insert(conn.name.as_str()) {
                return Err(LoopError::Config(format!(
                    "connection '{}' configured twice",
                    conn.name
                )));
            }
        }
        Ok(())
    }
}
