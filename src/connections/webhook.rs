//! Webhook connection
//!
//! Forwards every action as a JSON POST to a configured endpoint and maps
//! the HTTP response into a payload or a classified [`ConnectionError`].
//! This is how an agent reaches a platform bridge without the core knowing
//! anything about the platform itself.
//!
//! Request body:
//!
//! ```json
//! {"agent": "ExampleAgent", "connection": "twitter", "action": "post-tweet", "args": ["gm"]}
//! ```
//!
//! A JSON response body becomes the payload; anything else is returned as a
//! string. For `generate-text` the bridge answers `{"text": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ConnectionSettings, DEFAULT_LLM_ACTION};
use crate::error::{ConnectionError, LoopError, Result};

use super::{ActionResult, ActionSpec, Connection};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest error body echoed into a classified error.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Connection that POSTs actions to an HTTP endpoint.
pub struct WebhookConnection {
    name: String,
    agent: String,
    url: Option<String>,
    token_env: Option<String>,
    actions: Vec<ActionSpec>,
    llm: bool,
    client: Client,
}

impl WebhookConnection {
    /// Build from a configuration bag.
    ///
    /// Recognized fields: `url` (or `url_env`, the name of a variable
    /// holding it), `token_env`, `timeout_secs`, `llm` and `actions`.
    pub fn from_settings(
        agent: &str,
        settings: &ConnectionSettings,
        fallback: Vec<ActionSpec>,
    ) -> Result<Self> {
        let url = settings
            .get_str("url")
            .map(str::to_string)
            .or_else(|| {
                settings
                    .get_str("url_env")
                    .and_then(|var| std::env::var(var).ok())
            })
            .filter(|u| !u.trim().is_empty());

        let mut actions = match settings.extra.get("actions") {
            Some(raw) => serde_json::from_value::<Vec<ActionSpec>>(raw.clone()).map_err(|e| {
                LoopError::Config(format!("{}: invalid actions list: {}", settings.name, e))
            })?,
            None => fallback,
        };

        let llm = settings
            .extra
            .get("llm")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if llm && !actions.iter().any(|a| a.name == DEFAULT_LLM_ACTION) {
            actions.push(
                ActionSpec::new(DEFAULT_LLM_ACTION)
                    .param("prompt", super::ParamKind::Str)
                    .param("system_prompt", super::ParamKind::Str)
                    .describe("Generate text from a prompt"),
            );
        }

        let timeout = settings
            .get_u64("timeout_secs")
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            name: settings.name.clone(),
            agent: agent.to_string(),
            url,
            token_env: settings.get_str("token_env").map(str::to_string),
            actions,
            llm,
            client,
        })
    }

    fn token(&self) -> Option<String> {
        self.token_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.trim().is_empty())
    }
}

fn classify_request_error(err: reqwest::Error) -> ConnectionError {
    if err.is_builder() {
        ConnectionError::NotConfigured(format!("invalid request: {}", err))
    } else {
        ConnectionError::Transient(format!("request failed: {}", err))
    }
}

#[async_trait]
impl Connection for WebhookConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    fn is_configured(&self) -> bool {
        self.url.is_some() && (self.token_env.is_none() || self.token().is_some())
    }

    fn is_llm_provider(&self) -> bool {
        self.llm
    }

    async fn perform(&self, action: &str, args: Vec<Value>) -> ActionResult {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| ConnectionError::NotConfigured(format!("{}: no url", self.name)))?;

        let body = json!({
            "agent": self.agent,
            "connection": self.name,
            "action": action,
            "args": args,
        });

        let mut request = self.client.post(url).json(&body);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        } else if self.token_env.is_some() {
            return Err(ConnectionError::NotConfigured(format!(
                "{}: token variable is not set",
                self.name
            )));
        }

        debug!(connection = %self.name, action = action, "Webhook request");
        let response = request.send().await.map_err(classify_request_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify_request_error)?;

        if let Some(err) = ConnectionError::from_status(
            status,
            &text.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>(),
        ) {
            return Err(err);
        }

        Ok(serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text)))
    }
}
