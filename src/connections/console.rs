//! Console connection
//!
//! Dry-run stand-in for a real platform: every action is logged and echoed
//! back instead of reaching an external system. Useful for trying an agent
//! file before any credentials exist.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::config::{ConnectionSettings, DEFAULT_LLM_ACTION};
use crate::error::ConnectionError;

use super::{ActionResult, ActionSpec, Connection, ParamKind};

/// Connection that prints actions instead of performing them.
pub struct ConsoleConnection {
    name: String,
    actions: Vec<ActionSpec>,
    llm: bool,
    performed: AtomicU64,
}

impl ConsoleConnection {
    /// Create a console connection exposing `actions`.
    pub fn new(name: &str, actions: Vec<ActionSpec>) -> Self {
        Self {
            name: name.to_string(),
            actions,
            llm: false,
            performed: AtomicU64::new(0),
        }
    }

    /// Build from a configuration bag.
    ///
    /// Actions come from the bag's `actions` list when present, otherwise
    /// from `fallback`. Setting `"llm": true` makes the console answer
    /// `generate-text` by echoing the prompt.
    pub fn from_settings(
        settings: &ConnectionSettings,
        fallback: Vec<ActionSpec>,
    ) -> Result<Self, ConnectionError> {
        let actions = match settings.extra.get("actions") {
            Some(raw) => serde_json::from_value::<Vec<ActionSpec>>(raw.clone()).map_err(|e| {
                ConnectionError::InvalidArguments(format!(
                    "{}: invalid actions list: {}",
                    settings.name, e
                ))
            })?,
            None => fallback,
        };
        let console = Self::new(&settings.name, actions);
        let llm = settings
            .extra
            .get("llm")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(if llm { console.as_llm() } else { console })
    }

    /// Mark this console as a content generator answering `generate-text`.
    pub fn as_llm(mut self) -> Self {
        self.llm = true;
        if !self.actions.iter().any(|a| a.name == DEFAULT_LLM_ACTION) {
            self.actions.push(
                ActionSpec::new(DEFAULT_LLM_ACTION)
                    .param("prompt", ParamKind::Str)
                    .param("system_prompt", ParamKind::Str)
                    .describe("Echo the prompt as generated text"),
            );
        }
        self
    }

    /// Number of actions performed so far.
    pub fn performed(&self) -> u64 {
        self.performed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Connection for ConsoleConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn is_llm_provider(&self) -> bool {
        self.llm
    }

    async fn perform(&self, action: &str, args: Vec<Value>) -> ActionResult {
        if self.action_spec(action).is_none() {
            return Err(ConnectionError::UnsupportedAction(format!(
                "{} on {}",
                action, self.name
            )));
        }
        self.performed.fetch_add(1, Ordering::Relaxed);

        if self.llm && action == DEFAULT_LLM_ACTION {
            let prompt = args.first().and_then(|v| v.as_str()).unwrap_or_default();
            return Ok(json!({ "text": prompt }));
        }

        let echoed = Value::Array(args.clone());
        info!(
            connection = %self.name,
            action = action,
            args = %echoed,
            "Console action"
        );
        Ok(json!({
            "connection": self.name,
            "action": action,
            "args": args,
        }))
    }
}
