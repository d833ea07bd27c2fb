//! Run-level state exposed to observers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one generation run. Writes tagged with a stale run id are
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Phase of the two-step approval flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    #[default]
    Idle,
    IdentityDraft,
    ReviewIdentity,
    CampaignProduction,
    Complete,
    Failed,
}

impl GenerationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPhase::Idle => "idle",
            GenerationPhase::IdentityDraft => "identity_draft",
            GenerationPhase::ReviewIdentity => "review_identity",
            GenerationPhase::CampaignProduction => "campaign_production",
            GenerationPhase::Complete => "complete",
            GenerationPhase::Failed => "failed",
        }
    }

    /// Phases in which a new run may be started.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            GenerationPhase::Idle | GenerationPhase::Complete | GenerationPhase::Failed
        )
    }
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One entry of the user-facing log trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            level,
        }
    }
}

/// Action the operator must take on the provider credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialAlert {
    /// Credential missing or rejected.
    Reconfigure,
    /// Billing quota exhausted; a key with quota is needed.
    ReplaceKey,
}

/// Observable state of the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatus {
    pub run_id: Option<RunId>,
    pub phase: GenerationPhase,
    /// 0..=100, monotonic within a phase.
    pub progress: u8,
    pub status_text: String,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_alert: Option<CredentialAlert>,
    pub logs: Vec<LogEntry>,
    #[serde(skip)]
    pub(crate) busy_token: u64,
}

impl RunStatus {
    /// Move to `phase`, resetting progress when the phase changes.
    pub(crate) fn enter_phase(&mut self, phase: GenerationPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.progress = 0;
        }
    }

    /// Raise progress, never lowering it within the current phase.
    pub(crate) fn advance(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    pub(crate) fn push_log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry::new(level, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_within_phase() {
        let mut status = RunStatus::default();
        status.enter_phase(GenerationPhase::IdentityDraft);
        status.advance(40);
        status.advance(10);
        assert_eq!(status.progress, 40);
        status.advance(250);
        assert_eq!(status.progress, 100);
    }

    #[test]
    fn test_phase_change_resets_progress() {
        let mut status = RunStatus::default();
        status.enter_phase(GenerationPhase::IdentityDraft);
        status.advance(100);
        status.enter_phase(GenerationPhase::IdentityDraft);
        assert_eq!(status.progress, 100);
        status.enter_phase(GenerationPhase::CampaignProduction);
        assert_eq!(status.progress, 0);
    }

    #[test]
    fn test_can_start() {
        assert!(GenerationPhase::Idle.can_start());
        assert!(GenerationPhase::Complete.can_start());
        assert!(GenerationPhase::Failed.can_start());
        assert!(!GenerationPhase::ReviewIdentity.can_start());
        assert!(!GenerationPhase::IdentityDraft.can_start());
    }

    #[test]
    fn test_status_serialization_hides_token() {
        let status = RunStatus {
            busy_token: 7,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "idle");
        assert!(json.get("busy_token").is_none());
        assert!(json.get("current_error").is_none());
    }
}
