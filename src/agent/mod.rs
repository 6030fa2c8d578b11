//! Agent module - autonomous execution loop
//!
//! This module drives one agent profile. Each cycle the engine:
//!
//! - Filters the profile's tasks by weight, connection readiness and cooldown
//! - Draws one task with probability proportional to its effective weight
//! - Optionally generates content through the LLM binding
//! - Sends content through the moderation gate
//! - Dispatches the action and stamps the rate tracker
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Scheduler  │────>│ AgentEngine │────>│ Connection  │
//! │ (weighted)  │     │             │     │  Registry   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   │
//!        │                   ▼
//! ┌─────────────┐     ┌─────────────┐
//! │ RateTracker │<────│  Moderator  │
//! │ (cooldowns) │     │   (gate)    │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use loopclaw::agent::AgentEngine;
//! use loopclaw::config;
//!
//! async fn run_agent() {
//!     let profile = config::load("example").unwrap();
//!     let engine = Arc::new(AgentEngine::from_profile(profile).unwrap());
//!
//!     let handle = engine.spawn().unwrap();
//!     tokio::signal::ctrl_c().await.unwrap();
//!     engine.stop();
//!     handle.await.unwrap().unwrap();
//! }
//! ```

pub mod clock;
mod engine;
pub mod rate;
pub mod scheduler;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::AgentEngine;
pub use rate::{RateKey, RateTracker};
pub use scheduler::{candidate_set, current_period, pick_weighted, Candidate, CandidateSet, Exclusion};
pub use status::{AgentStatus, CycleOutcome, LastAction, LoopState};
