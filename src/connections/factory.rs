//! Connection factory/registration helpers.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{AgentProfile, ConnectionSettings};
use crate::error::{LoopError, Result};

use super::{ActionSpec, Connection, ConnectionRegistry, ConsoleConnection, WebhookConnection};

/// Actions a connection exposes when its bag has no `actions` list.
///
/// Tasks bound to the connection contribute their action names. A console
/// that is not the LLM connection also picks up unbound tasks so a fresh
/// agent file can be dry-run as is.
fn fallback_actions(profile: &AgentProfile, settings: &ConnectionSettings) -> Vec<ActionSpec> {
    let include_unbound =
        settings.kind() == "console" && settings.name != profile.llm_binding().connection;
    let mut actions: Vec<ActionSpec> = Vec::new();
    for task in &profile.tasks {
        let bound_here = task.connection.as_deref() == Some(settings.name.as_str());
        if bound_here || (include_unbound && task.connection.is_none()) {
            let name = task.action_name();
            if !actions.iter().any(|a| a.name == name) {
                actions.push(ActionSpec::new(name));
            }
        }
    }
    actions
}

/// Build a registry holding every configured connection of `profile`.
///
/// Connections whose kind has no implementation are skipped with a warning.
/// The connection named by the profile's LLM binding is flagged as the
/// content generator.
pub fn build_registry(profile: &AgentProfile) -> Result<ConnectionRegistry> {
    let mut registry = ConnectionRegistry::new();
    let llm_connection = profile.llm_binding().connection;

    for settings in &profile.config {
        let mut settings = settings.clone();
        if settings.name == llm_connection {
            settings.extra.insert("llm".into(), Value::Bool(true));
        }
        let fallback = fallback_actions(profile, &settings);

        match settings.kind() {
            "console" => {
                let conn = ConsoleConnection::from_settings(&settings, fallback)
                    .map_err(|e| LoopError::Config(e.to_string()))?;
                registry.register(Arc::new(conn))?;
            }
            "webhook" => {
                let conn = WebhookConnection::from_settings(&profile.name, &settings, fallback)?;
                if !conn.is_configured() {
                    warn!(
                        connection = %settings.name,
                        "Webhook connection has no url or token; it will stay idle"
                    );
                }
                registry.register(Arc::new(conn))?;
            }
            other => {
                warn!(
                    connection = %settings.name,
                    kind = other,
                    "Connection kind is not implemented; skipping"
                );
            }
        }
    }

    info!(
        agent = %profile.name,
        registered = registry.len(),
        ready = registry.list_ready().len(),
        "Connections registered"
    );
    Ok(registry)
}
