//! Moderation gate for LoopClaw.
//!
//! When an agent is moderated, every piece of user-facing content passes a
//! [`Moderator`] before its action is dispatched. The gate is fail-closed:
//! a moderator that errors counts as a rejection.

use async_trait::async_trait;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::Serialize;
use tracing::warn;

use crate::config::ModerationConfig;
use crate::error::{LoopError, Result};

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of reviewing one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Rejected(String),
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }
}

// ---------------------------------------------------------------------------
// Moderator
// ---------------------------------------------------------------------------

/// Reviews content before it is published.
#[async_trait]
pub trait Moderator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Review one piece of content.
    async fn review(&self, content: &str) -> Result<Verdict>;
}

/// Review `content`, turning a moderator failure into a rejection.
///
/// A missing moderator also rejects: a moderated agent never publishes
/// content nobody looked at.
pub async fn review_fail_closed(moderator: Option<&dyn Moderator>, content: &str) -> Verdict {
    let Some(moderator) = moderator else {
        return Verdict::Rejected("no moderator available".to_string());
    };
    match moderator.review(content).await {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(moderator = moderator.name(), error = %e, "Moderator failed; rejecting content");
            Verdict::Rejected(format!("moderation unavailable: {}", e))
        }
    }
}

// ---------------------------------------------------------------------------
// KeywordModerator
// ---------------------------------------------------------------------------

/// Rejects content containing any blocked term, ignoring ASCII case.
pub struct KeywordModerator {
    terms: Vec<String>,
    matcher: Option<AhoCorasick>,
}

impl KeywordModerator {
    /// Build a moderator from a list of blocked terms.
    ///
    /// Blank terms are ignored; an empty list approves everything.
    pub fn new(terms: &[String]) -> Result<Self> {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let matcher = if terms.is_empty() {
            None
        } else {
            Some(
                AhoCorasickBuilder::new()
                    .ascii_case_insensitive(true)
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&terms)
                    .map_err(|e| LoopError::Moderation(format!("invalid blocked terms: {}", e)))?,
            )
        };
        Ok(Self { terms, matcher })
    }

    /// Build from the agent's moderation section.
    pub fn from_config(config: &ModerationConfig) -> Result<Self> {
        Self::new(&config.blocked_terms)
    }

    /// Number of active blocked terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[async_trait]
impl Moderator for KeywordModerator {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn review(&self, content: &str) -> Result<Verdict> {
        let Some(matcher) = &self.matcher else {
            return Ok(Verdict::Approved);
        };
        Ok(match matcher.find(content) {
            Some(m) => Verdict::Rejected(format!(
                "blocked term '{}'",
                self.terms[m.pattern().as_usize()]
            )),
            None => Verdict::Approved,
        })
    }
}
