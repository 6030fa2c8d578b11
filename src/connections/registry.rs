//! Connection registry for LoopClaw
//!
//! The registry is the single authority on which connections exist, which of
//! them are ready, and which actions they expose. It is populated once at
//! startup and shared read-only by the execution engine afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::TaskConfig;
use crate::error::{ConnectionError, LoopError, Result};

use super::{ActionResult, Connection};

/// Listing entry for one action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSummary {
    pub name: String,
    pub usage: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Listing entry for one connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub name: String,
    pub configured: bool,
    pub llm: bool,
    pub actions: Vec<ActionSummary>,
}

/// Name-keyed set of connections.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use loopclaw::connections::{ActionSpec, ConnectionRegistry, ConsoleConnection};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ConnectionRegistry::new();
/// registry
///     .register(Arc::new(ConsoleConnection::new("console", vec![ActionSpec::new("post")])))
///     .unwrap();
///
/// assert!(registry.is_ready("console"));
/// let payload = registry.perform("console", "post", vec![json!("gm")]).await.unwrap();
/// assert_eq!(payload["action"], "post");
/// # });
/// ```
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<String, Arc<dyn Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: BTreeMap::new(),
        }
    }

    /// Register a connection under its own name.
    ///
    /// Names are unique; registering a second connection with the same name
    /// fails with [`LoopError::DuplicateConnection`]. An action whose content
    /// index is out of range fails with [`LoopError::Config`].
    pub fn register(&mut self, connection: Arc<dyn Connection>) -> Result<()> {
        let name = connection.name().to_string();
        if self.connections.contains_key(&name) {
            return Err(LoopError::DuplicateConnection(name));
        }
        for spec in connection.actions() {
            spec.check()
                .map_err(|e| LoopError::Config(format!("connection '{}': {}", name, e)))?;
        }
        info!(
            connection = %name,
            configured = connection.is_configured(),
            actions = connection.actions().len(),
            "Registering connection"
        );
        self.connections.insert(name, connection);
        Ok(())
    }

    /// Look up a connection by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Connection>> {
        self.connections
            .get(name)
            .cloned()
            .ok_or_else(|| LoopError::UnknownConnection(name.to_string()))
    }

    /// Check if a connection is registered.
    pub fn has(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Names of all registered connections, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.connections.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether `name` is registered and configured.
    pub fn is_ready(&self, name: &str) -> bool {
        self.connections
            .get(name)
            .map(|c| c.is_configured())
            .unwrap_or(false)
    }

    /// Names of connections that are registered and configured, sorted.
    pub fn list_ready(&self) -> Vec<&str> {
        self.connections
            .iter()
            .filter(|(_, c)| c.is_configured())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Whether `connection` exposes `action`.
    pub fn supports(&self, connection: &str, action: &str) -> bool {
        self.connections
            .get(connection)
            .map(|c| c.action_spec(action).is_some())
            .unwrap_or(false)
    }

    /// Map a task to the ready connection that will perform it.
    ///
    /// An explicit binding must name a ready connection exposing the action.
    /// Without one, the action must be exposed by exactly one ready
    /// connection; zero or several matches leave the task unresolved.
    pub fn resolve(&self, task: &TaskConfig) -> Option<(String, String)> {
        let action = task.action_name();
        match &task.connection {
            Some(conn) => (self.is_ready(conn) && self.supports(conn, action))
                .then(|| (conn.clone(), action.to_string())),
            None => {
                let mut matches = self
                    .connections
                    .iter()
                    .filter(|(_, c)| c.is_configured() && c.action_spec(action).is_some())
                    .map(|(n, _)| n);
                match (matches.next(), matches.next()) {
                    (Some(only), None) => Some((only.clone(), action.to_string())),
                    _ => None,
                }
            }
        }
    }

    /// Every connection with its readiness and actions.
    pub fn list_connections(&self) -> Vec<ConnectionSummary> {
        self.connections
            .values()
            .map(|c| ConnectionSummary {
                name: c.name().to_string(),
                configured: c.is_configured(),
                llm: c.is_llm_provider(),
                actions: action_summaries(c.as_ref()),
            })
            .collect()
    }

    /// Actions exposed by one connection, with usage strings.
    pub fn list_actions(&self, connection: &str) -> Result<Vec<ActionSummary>> {
        Ok(action_summaries(self.get(connection)?.as_ref()))
    }

    /// Resolve a connection and normalize arguments for one action.
    ///
    /// Fails with a configuration-class error when the connection is
    /// unknown or unconfigured, the action is missing, or the arguments do
    /// not satisfy the action's contract. Nothing is performed.
    pub fn prepare(
        &self,
        connection: &str,
        action: &str,
        args: Vec<Value>,
    ) -> Result<(Arc<dyn Connection>, Vec<Value>)> {
        let conn = self.get(connection)?;
        if !conn.is_configured() {
            return Err(ConnectionError::NotConfigured(connection.to_string()).into());
        }
        let spec = conn.action_spec(action).ok_or_else(|| {
            ConnectionError::UnsupportedAction(format!("{} on {}", action, connection))
        })?;
        let args = spec.coerce_args(args)?;
        Ok((conn, args))
    }

    /// Perform a prepared action, logging its outcome and duration.
    pub async fn invoke(conn: &Arc<dyn Connection>, action: &str, args: Vec<Value>) -> ActionResult {
        let start = Instant::now();
        let result = conn.perform(action, args).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(
                connection = conn.name(),
                action = action,
                duration_ms = duration_ms,
                "Action performed"
            ),
            Err(e) if e.is_configuration() => warn!(
                connection = conn.name(),
                action = action,
                error = %e,
                duration_ms = duration_ms,
                "Action skipped"
            ),
            Err(e) => error!(
                connection = conn.name(),
                action = action,
                error = %e,
                duration_ms = duration_ms,
                "Action failed"
            ),
        }
        result
    }

    /// Prepare and perform an action in one call.
    pub async fn perform(&self, connection: &str, action: &str, args: Vec<Value>) -> Result<Value> {
        let (conn, args) = self.prepare(connection, action, args)?;
        Ok(Self::invoke(&conn, action, args).await?)
    }
}

fn action_summaries(conn: &dyn Connection) -> Vec<ActionSummary> {
    conn.actions()
        .iter()
        .map(|a| ActionSummary {
            name: a.name.clone(),
            usage: a.usage(),
            description: a.description.clone(),
        })
        .collect()
}
