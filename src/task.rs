use serde::{Deserialize, Serialize};

/// The inference tasks a pipeline can be constructed for.
///
/// Why this exists:
/// - We want a single, strongly-typed task designator shared by the CLI
///   drivers and library code.
/// - Using an enum avoids stringly-typed conditionals and keeps pipeline
///   construction explicit and discoverable.
///
/// Integration notes:
/// - `ValueEnum` allows this enum to be used directly as a CLI flag with `clap`.
/// - Each variant maps to a concrete pipeline constructor in [`crate::pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Task {
    /// Restore punctuation marks in unpunctuated speech-recognition text.
    Punctuation,

    /// Detect speech activity time ranges in an audio resource.
    VoiceActivityDetection,
}

impl Task {
    /// Stable string form used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Task::Punctuation => "punctuation",
            Task::VoiceActivityDetection => "voice-activity-detection",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
