//! Voice activity detection.
//!
//! The detection contract mirrors the punctuation side: a pipeline is
//! constructed once and invoked with an audio reference, returning the list of
//! detected speech time ranges. The driver performs exactly one invocation and
//! surfaces the result verbatim, so the whole flow is verifiable with a test
//! double.

mod policy;
mod silero;

pub use policy::{DEFAULT_VAD_POLICY, VadPolicy};
pub use silero::SileroVad;

use crate::Result;
use crate::audio::AudioSource;
use crate::segments::SpeechSegment;

/// Pluggable voice-activity-detection pipeline.
///
/// The pipeline owns audio materialization: the caller hands over the audio
/// reference unmodified and never pre-fetches or pre-decodes it.
pub trait VadPipeline {
    fn detect(&mut self, audio_in: &AudioSource) -> Result<Vec<SpeechSegment>>;
}

/// Run one detection pass over a single audio resource.
///
/// The pipeline is invoked exactly once; the returned segment list is passed
/// through unmodified. Pipeline failures propagate unchanged — no retry, no
/// recovery.
pub fn detect_once<P: VadPipeline>(
    pipeline: &mut P,
    audio_in: &AudioSource,
) -> Result<Vec<SpeechSegment>> {
    pipeline.detect(audio_in)
}
