use serde::Serialize;

/// One detected speech time range.
///
/// Timestamps are expressed in seconds from the start of the audio resource.
/// The detection driver treats these values as opaque output; interpretation
/// (snapping, merging, downstream ASR windowing) belongs to consumers.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SpeechSegment {
    pub start_seconds: f32,
    pub end_seconds: f32,
}

impl SpeechSegment {
    /// Duration of this segment in seconds.
    pub fn duration_seconds(&self) -> f32 {
        (self.end_seconds - self.start_seconds).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_clamped_to_zero_for_inverted_ranges() {
        let seg = SpeechSegment {
            start_seconds: 2.0,
            end_seconds: 1.0,
        };
        assert_eq!(seg.duration_seconds(), 0.0);
    }
}
