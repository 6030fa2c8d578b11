//! LoopClaw - autonomous agent loop with weighted task scheduling

pub mod agent;
pub mod config;
pub mod connections;
pub mod error;
pub mod moderation;
pub mod utils;

pub use agent::{AgentEngine, AgentStatus, CycleOutcome, LoopState};
pub use config::{AgentProfile, TaskConfig};
pub use connections::{Connection, ConnectionRegistry};
pub use error::{ConnectionError, LoopError, Result};
pub use moderation::{KeywordModerator, Moderator, Verdict};
