#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialVariant {
    /// Live feed, pass/fail feedback, stop button.
    Live,
    /// Live variant plus start/stop-recording controls.
    Recording,
    /// One detection against a fixed image, then auto-finalize.
    StaticImage,
}

#[derive(Debug, Clone)]
pub struct TrialConfig {
    /// Opaque identifier from the host, passed through unchanged.
    pub trial: String,
    pub variant: TrialVariant,
    /// Consecutive per-frame detection failures tolerated before the trial
    /// faults. Isolated failures skip the frame.
    pub max_consecutive_detect_failures: u32,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            trial: "trial-0".to_string(),
            variant: TrialVariant::Live,
            max_consecutive_detect_failures: 30,
        }
    }
}
