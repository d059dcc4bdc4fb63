use serde::{Deserialize, Serialize};

/// Trial lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialState {
    LoadingModel,
    AcquiringCamera,
    Detecting,
    Faulted,
    Complete,
}

/// What the participant-facing surface should show right now.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackState {
    /// Model is still loading.
    Loading,
    /// Camera stream is being acquired.
    Acquiring,
    /// Affirmative state: at least two hands in frame.
    TwoHands,
    /// Negative state: fewer than two hands in frame.
    HandsMissing,
    /// Static-image variant: textual summary of every detected label.
    Summary(String),
    /// Visible error banner; nothing freezes silently.
    Faulted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    Completed,
    Faulted,
}

/// Recorded result, handed to the host exactly once per trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: String,
    pub trial_duration_ms: u64,
    pub frames_polled: u64,
    pub outcome: TrialOutcome,
}
