//! Per-title state machine and batch report
//!
//! Discovered → Resolving → Rewriting → Materializing → Notifying → Done,
//! with Failed reachable from the working states.

use super::ResolvedIdentity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// Processing state of one title
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleState {
    Discovered,
    Resolving,
    Rewriting,
    Materializing,
    Notifying,
    Done,
    /// Stopped early; `unit` names the pack or step that failed
    Failed { unit: String },
}

impl TitleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TitleState::Done | TitleState::Failed { .. })
    }
}

/// A pack left out of the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackSkip {
    pub pack_id: String,
    pub reason: String,
}

/// Result of processing one title directory
#[derive(Debug, Clone, Serialize)]
pub struct TitleOutcome {
    pub location: PathBuf,
    pub root_id: Option<String>,
    pub state: TitleState,
    pub identity: Option<ResolvedIdentity>,
    /// Packs whose metadata document was written
    pub written: Vec<String>,
    pub skipped: Vec<PackSkip>,
    pub assets_copied: usize,
    /// Assets already present at the target and left untouched
    pub assets_existing: usize,
    pub error_code: Option<String>,
    pub error: Option<String>,
}

impl TitleOutcome {
    pub fn new(location: PathBuf, root_id: Option<String>) -> Self {
        Self {
            location,
            root_id,
            state: TitleState::Discovered,
            identity: None,
            written: Vec::new(),
            skipped: Vec::new(),
            assets_copied: 0,
            assets_existing: 0,
            error_code: None,
            error: None,
        }
    }

    /// Transition to a new state
    pub fn transition_to(&mut self, state: TitleState) {
        tracing::debug!(
            title = %self.location.display(),
            from = ?self.state,
            to = ?state,
            "Title state transition"
        );
        self.state = state;
    }

    /// Mark as failed at `unit` with the given error
    pub fn fail(&mut self, unit: impl Into<String>, code: &str, message: String) {
        self.transition_to(TitleState::Failed { unit: unit.into() });
        self.error_code = Some(code.to_string());
        self.error = Some(message);
    }

    pub fn is_done(&self) -> bool {
        self.state == TitleState::Done
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, TitleState::Failed { .. })
    }
}

/// Outcome of a whole batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub session_id: Uuid,
    pub input_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub titles: Vec<TitleOutcome>,
    /// Set when a batch-fatal error stopped the walk early
    pub aborted: Option<BatchAbort>,
}

/// Why and where a batch stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAbort {
    pub location: PathBuf,
    pub error_code: String,
    pub error: String,
}

impl BatchReport {
    pub fn new(input_root: PathBuf) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            input_root,
            started_at: Utc::now(),
            ended_at: None,
            titles: Vec::new(),
            aborted: None,
        }
    }

    pub fn push(&mut self, outcome: TitleOutcome) {
        self.titles.push(outcome);
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Close the report after a batch-fatal error at `location`
    pub fn abort(&mut self, location: PathBuf, code: &str, message: String) {
        self.aborted = Some(BatchAbort {
            location,
            error_code: code.to_string(),
            error: message,
        });
        self.finish();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn completed_count(&self) -> usize {
        self.titles.iter().filter(|t| t.is_done()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.titles.iter().filter(|t| t.is_failed()).count()
    }

    /// Completed titles addressed through a fallback identity
    pub fn fallback_count(&self) -> usize {
        self.titles
            .iter()
            .filter(|t| t.identity.as_ref().map(|i| i.is_fallback()).unwrap_or(false))
            .count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
