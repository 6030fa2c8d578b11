//! Connections for LoopClaw
//!
//! A connection is a pluggable provider of named actions against one external
//! system (social platform, LLM, blockchain). The scheduler only sees the
//! capability surface defined by the [`Connection`] trait; adding a new
//! system means registering a new implementation, never branching on type.

pub mod console;
pub mod factory;
pub mod registry;
pub mod webhook;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectionError;

pub use console::ConsoleConnection;
pub use factory::build_registry;
pub use registry::{ActionSummary, ConnectionRegistry, ConnectionSummary};
pub use webhook::WebhookConnection;

/// Result of a single connection action.
pub type ActionResult = std::result::Result<Value, ConnectionError>;

/// Expected type of one positional action argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Free text; non-string scalars are rendered to text
    #[default]
    Str,
    /// Integer; numeric strings are accepted
    Int,
    /// Any JSON value, passed through untouched
    Any,
}

/// One named positional parameter of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParam {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
}

impl ActionParam {
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Parameter contract of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Action name
    pub name: String,
    /// Required positional parameters, in order
    #[serde(default)]
    pub params: Vec<ActionParam>,
    /// Index of the parameter carrying user-facing content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_param: Option<usize>,
    /// One-line description for listings
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ActionSpec {
    /// An action that takes no declared parameters.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            content_param: None,
            description: String::new(),
        }
    }

    /// Append a required parameter.
    pub fn param(mut self, name: &str, kind: ParamKind) -> Self {
        self.params.push(ActionParam::new(name, kind));
        self
    }

    /// Append a required parameter that carries user-facing content.
    pub fn content(mut self, name: &str) -> Self {
        self.content_param = Some(self.params.len());
        self.params.push(ActionParam::new(name, ParamKind::Str));
        self
    }

    /// Set the listing description.
    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Usage string such as `<tweet_id> <message>`.
    pub fn usage(&self) -> String {
        self.params
            .iter()
            .map(|p| format!("<{}>", p.name))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check and normalize positional arguments against the contract.
    ///
    /// Surplus arguments are joined into a trailing text parameter, so a
    /// message split on whitespace by a shell arrives as one string.
    pub fn coerce_args(&self, mut args: Vec<Value>) -> Result<Vec<Value>, ConnectionError> {
        if args.len() < self.params.len() {
            return Err(ConnectionError::InvalidArguments(format!(
                "{} requires {} argument(s): {}",
                self.name,
                self.params.len(),
                self.usage()
            )));
        }

        if let Some(last) = self.params.last() {
            if last.kind == ParamKind::Str && args.len() > self.params.len() {
                let tail: Vec<String> = args
                    .split_off(self.params.len() - 1)
                    .iter()
                    .map(value_to_text)
                    .collect();
                args.push(Value::String(tail.join(" ")));
            }
        }

        for (value, param) in args.iter_mut().zip(self.params.iter()) {
            *value = match param.kind {
                ParamKind::Any => value.take(),
                ParamKind::Str => Value::String(strip_quotes(&value_to_text(value))),
                ParamKind::Int => match value {
                    Value::Number(n) if n.is_i64() || n.is_u64() => value.take(),
                    Value::String(s) => match s.trim().parse::<i64>() {
                        Ok(n) => Value::from(n),
                        Err(_) => {
                            return Err(ConnectionError::InvalidArguments(format!(
                                "{} must be a number, got '{}'",
                                param.name, s
                            )))
                        }
                    },
                    other => {
                        return Err(ConnectionError::InvalidArguments(format!(
                            "{} must be a number, got {}",
                            param.name, other
                        )))
                    }
                },
            };
        }
        Ok(args)
    }

    /// Reject contracts whose content index points past the parameters.
    pub fn check(&self) -> Result<(), ConnectionError> {
        match self.content_param {
            Some(i) if i >= self.params.len() => Err(ConnectionError::InvalidArguments(format!(
                "{}: content_param {} is out of range for {} parameter(s)",
                self.name,
                i,
                self.params.len()
            ))),
            _ => Ok(()),
        }
    }

    /// User-facing content carried by `args`, if this action has any.
    pub fn content_of<'a>(&self, args: &'a [Value]) -> Option<&'a str> {
        self.content_param
            .and_then(|i| args.get(i))
            .and_then(|v| v.as_str())
    }

    /// Text a moderator must see before `args` are sent.
    ///
    /// The declared content parameter when there is one. Otherwise every
    /// string argument, since nothing marks which of them reach users.
    pub fn reviewable_text(&self, args: &[Value]) -> Option<String> {
        if self.content_param.is_some() {
            return self.content_of(args).map(str::to_string);
        }
        let parts: Vec<&str> = args
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn strip_quotes(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Extract generated text from an action payload.
///
/// Accepts a bare string or an object carrying `text` or `content`.
pub fn payload_text(payload: &Value) -> Option<String> {
    match payload {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
    .filter(|s| !s.trim().is_empty())
}

/// Capability surface every connection exposes to the agent loop.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use loopclaw::connections::{ActionResult, ActionSpec, Connection};
///
/// struct Ping {
///     actions: Vec<ActionSpec>,
/// }
///
/// #[async_trait]
/// impl Connection for Ping {
///     fn name(&self) -> &str { "ping" }
///     fn actions(&self) -> &[ActionSpec] { &self.actions }
///     fn is_configured(&self) -> bool { true }
///     async fn perform(&self, _action: &str, _args: Vec<Value>) -> ActionResult {
///         Ok(json!("pong"))
///     }
/// }
/// ```
#[async_trait]
pub trait Connection: Send + Sync {
    /// Registry key of this connection.
    fn name(&self) -> &str;

    /// Parameter contracts of every supported action.
    fn actions(&self) -> &[ActionSpec];

    /// Whether credentials are present and the connection can act.
    fn is_configured(&self) -> bool;

    /// Perform an action with already-validated positional arguments.
    ///
    /// May be long-running; the caller is free to drop the future when the
    /// agent is stopped.
    async fn perform(&self, action: &str, args: Vec<Value>) -> ActionResult;

    /// Names of every supported action.
    fn supported_actions(&self) -> HashSet<String> {
        self.actions().iter().map(|a| a.name.clone()).collect()
    }

    /// Contract of one action.
    fn action_spec(&self, action: &str) -> Option<&ActionSpec> {
        self.actions().iter().find(|a| a.name == action)
    }

    /// Whether this connection generates content for other connections.
    fn is_llm_provider(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply_spec() -> ActionSpec {
        ActionSpec::new("reply-to-tweet")
            .param("tweet_id", ParamKind::Str)
            .content("message")
    }

    #[test]
    fn test_usage() {
        assert_eq!(reply_spec().usage(), "<tweet_id> <message>");
        assert_eq!(ActionSpec::new("check-model").usage(), "");
    }

    #[test]
    fn test_coerce_rejects_missing_args() {
        let err = reply_spec().coerce_args(vec![json!("123")]).unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidArguments(_)));
        assert!(err.to_string().contains("<tweet_id> <message>"));
    }

    #[test]
    fn test_coerce_joins_trailing_message() {
        let args = vec![json!("123"), json!("hello"), json!("there"), json!("world")];
        let out = reply_spec().coerce_args(args).unwrap();
        assert_eq!(out, vec![json!("123"), json!("hello there world")]);
    }

    #[test]
    fn test_coerce_strips_quotes() {
        let spec = ActionSpec::new("post-tweet").content("message");
        let out = spec.coerce_args(vec![json!("\"gm\"")]).unwrap();
        assert_eq!(out, vec![json!("gm")]);
    }

    #[test]
    fn test_coerce_int_param() {
        let spec = ActionSpec::new("get-latest-tweets")
            .param("username", ParamKind::Str)
            .param("count", ParamKind::Int);
        let out = spec.coerce_args(vec![json!("ned"), json!("10")]).unwrap();
        assert_eq!(out, vec![json!("ned"), json!(10)]);

        let err = spec
            .coerce_args(vec![json!("ned"), json!("ten")])
            .unwrap_err();
        assert!(err.to_string().contains("count must be a number"));
    }

    #[test]
    fn test_coerce_no_params_passes_through() {
        let spec = ActionSpec::new("anything");
        let args = vec![json!({"k": 1}), json!(2)];
        assert_eq!(spec.coerce_args(args.clone()).unwrap(), args);
    }

    #[test]
    fn test_content_of() {
        let spec = reply_spec();
        let args = vec![json!("1"), json!("nice thread")];
        assert_eq!(spec.content_of(&args), Some("nice thread"));
        assert_eq!(ActionSpec::new("like").content_of(&args), None);
    }

    #[test]
    fn test_check_content_param_range() {
        assert!(reply_spec().check().is_ok());
        assert!(ActionSpec::new("like").check().is_ok());

        let mut spec = ActionSpec::new("post-tweet").param("message", ParamKind::Str);
        spec.content_param = Some(1);
        let err = spec.check().unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_reviewable_text() {
        let args = vec![json!("1"), json!("nice thread")];
        assert_eq!(
            reply_spec().reviewable_text(&args),
            Some("nice thread".to_string())
        );
        // undeclared contracts expose every string argument
        let bare = ActionSpec::new("post");
        assert_eq!(
            bare.reviewable_text(&[json!("gm"), json!(3), json!("wagmi")]),
            Some("gm\nwagmi".to_string())
        );
        assert_eq!(bare.reviewable_text(&[json!(42)]), None);
        assert_eq!(bare.reviewable_text(&[]), None);
    }

    #[test]
    fn test_payload_text() {
        assert_eq!(payload_text(&json!("hi")), Some("hi".to_string()));
        assert_eq!(payload_text(&json!({"text": "gm"})), Some("gm".to_string()));
        assert_eq!(
            payload_text(&json!({"content": "yo"})),
            Some("yo".to_string())
        );
        assert_eq!(payload_text(&json!({"text": "  "})), None);
        assert_eq!(payload_text(&json!(42)), None);
    }

    #[test]
    fn test_action_spec_deserialize() {
        let spec: ActionSpec = serde_json::from_value(json!({
            "name": "transfer",
            "params": [{"name": "to"}, {"name": "amount", "kind": "int"}]
        }))
        .unwrap();
        assert_eq!(spec.params[0].kind, ParamKind::Str);
        assert_eq!(spec.params[1].kind, ParamKind::Int);
        assert_eq!(spec.content_param, None);
    }
}
