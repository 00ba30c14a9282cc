use crate::segments::SpeechSegment;

/// Policy knobs for turning per-window speech probabilities into segments.
///
/// These values are intentionally simple and expressed in human-friendly units
/// (ms), converted to sample counts at the detection sample rate.
#[derive(Debug, Clone, Copy)]
pub struct VadPolicy {
    /// Speech probability threshold (higher = more conservative).
    pub threshold: f32,

    /// Padding to include before each speech segment.
    pub pre_pad_ms: u32,

    /// Padding to include after each speech segment.
    pub post_pad_ms: u32,

    /// Drop speech segments shorter than this duration.
    pub min_speech_ms: u32,

    /// Merge speech segments separated by less than this gap.
    pub gap_merge_ms: u32,
}

/// Default policy tuned for "report speech ranges, ignore blips".
pub const DEFAULT_VAD_POLICY: VadPolicy = VadPolicy {
    threshold: 0.5,
    pre_pad_ms: 250,
    post_pad_ms: 250,
    min_speech_ms: 250,
    gap_merge_ms: 300,
};

/// Convert per-window speech probabilities into speech segments.
///
/// Steps:
/// - Threshold probabilities into active windows and collect consecutive runs
///   as raw sample ranges.
/// - Drop runs shorter than the policy minimum.
/// - Pad each surviving range and merge overlaps / near-gaps.
/// - Convert the merged sample ranges into second-based segments.
pub fn segments_from_probs(
    probs: &[f32],
    window_samples: usize,
    sample_rate_hz: u32,
    total_samples: usize,
    policy: VadPolicy,
) -> Vec<SpeechSegment> {
    let raw = active_runs(probs, policy.threshold, window_samples, total_samples);
    let ranges = apply_policy(&raw, sample_rate_hz, total_samples, policy);
    ranges_to_segments(&ranges, sample_rate_hz)
}

/// Collect consecutive above-threshold windows into raw sample ranges.
fn active_runs(
    probs: &[f32],
    threshold: f32,
    window_samples: usize,
    total_samples: usize,
) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<(usize, usize)> = None;

    for (i, &p) in probs.iter().enumerate() {
        let start = i * window_samples;
        let end = (start + window_samples).min(total_samples);

        if p >= threshold {
            current = match current {
                Some((s, _)) => Some((s, end)),
                None => Some((start, end)),
            };
        } else if let Some(run) = current.take() {
            runs.push(run);
        }
    }

    if let Some(run) = current {
        runs.push(run);
    }

    runs
}

/// Apply minimum-duration filtering, padding, and merging to raw ranges.
///
/// Invariant: the returned ranges are sorted and non-overlapping.
fn apply_policy(
    raw: &[(usize, usize)],
    sample_rate_hz: u32,
    total_samples: usize,
    policy: VadPolicy,
) -> Vec<(usize, usize)> {
    let sample_rate = sample_rate_hz as f32;

    // Convert policy values from ms -> samples once.
    let pre_pad_samples = ms_to_samples(policy.pre_pad_ms, sample_rate);
    let post_pad_samples = ms_to_samples(policy.post_pad_ms, sample_rate);
    let min_speech_samples = ms_to_samples(policy.min_speech_ms, sample_rate);
    let gap_merge_samples = ms_to_samples(policy.gap_merge_ms, sample_rate);

    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for &(mut start_idx, mut end_idx) in raw {
        // Drop very short speech runs according to policy.
        let dur = end_idx.saturating_sub(start_idx);
        if dur < min_speech_samples {
            continue;
        }

        // Apply padding in samples, clamped to the buffer.
        start_idx = start_idx.saturating_sub(pre_pad_samples);
        end_idx = (end_idx + post_pad_samples).min(total_samples);

        if start_idx >= end_idx {
            continue;
        }

        // Merge with previous if overlapping or gap is small.
        if let Some((_, prev_end)) = ranges.last_mut() {
            let gap = start_idx.saturating_sub(*prev_end);
            if start_idx <= *prev_end || gap <= gap_merge_samples {
                *prev_end = (*prev_end).max(end_idx);
                continue;
            }
        }

        ranges.push((start_idx, end_idx));
    }

    ranges
}

fn ranges_to_segments(ranges: &[(usize, usize)], sample_rate_hz: u32) -> Vec<SpeechSegment> {
    let sample_rate = sample_rate_hz as f32;
    ranges
        .iter()
        .map(|&(s, e)| SpeechSegment {
            start_seconds: s as f32 / sample_rate,
            end_seconds: e as f32 / sample_rate,
        })
        .collect()
}

/// Convert milliseconds -> number of samples at `sample_rate`.
///
/// We round to the nearest sample so padding is stable across rates.
fn ms_to_samples(ms: u32, sample_rate: f32) -> usize {
    ((ms as f32 / 1000.0) * sample_rate).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;
    const WINDOW: usize = 512;

    fn quiet_policy() -> VadPolicy {
        // Zero padding/merging so tests can reason about exact boundaries.
        VadPolicy {
            threshold: 0.5,
            pre_pad_ms: 0,
            post_pad_ms: 0,
            min_speech_ms: 0,
            gap_merge_ms: 0,
        }
    }

    #[test]
    fn active_runs_groups_consecutive_windows() {
        let probs = [0.1, 0.9, 0.9, 0.1, 0.8];
        let runs = active_runs(&probs, 0.5, WINDOW, WINDOW * 5);
        assert_eq!(runs, vec![(WINDOW, WINDOW * 3), (WINDOW * 4, WINDOW * 5)]);
    }

    #[test]
    fn active_runs_clamps_final_window_to_buffer_len() {
        let probs = [0.9];
        let runs = active_runs(&probs, 0.5, WINDOW, 100);
        assert_eq!(runs, vec![(0, 100)]);
    }

    #[test]
    fn apply_policy_drops_short_runs() {
        let policy = VadPolicy {
            min_speech_ms: 100, // 1600 samples
            ..quiet_policy()
        };
        let raw = vec![(0, 512), (10_000, 20_000)];
        let ranges = apply_policy(&raw, RATE, 20_000, policy);
        assert_eq!(ranges, vec![(10_000, 20_000)]);
    }

    #[test]
    fn apply_policy_pads_and_clamps_to_buffer() {
        let policy = VadPolicy {
            pre_pad_ms: 100,  // 1600 samples
            post_pad_ms: 100, // 1600 samples
            ..quiet_policy()
        };
        let raw = vec![(1000, 9_000)];
        let ranges = apply_policy(&raw, RATE, 9_500, policy);
        assert_eq!(ranges, vec![(0, 9_500)]);
    }

    #[test]
    fn apply_policy_merges_near_ranges() {
        let policy = VadPolicy {
            gap_merge_ms: 100, // 1600 samples
            ..quiet_policy()
        };
        let raw = vec![(0, 8_000), (9_000, 16_000), (32_000, 40_000)];
        let ranges = apply_policy(&raw, RATE, 40_000, policy);
        assert_eq!(ranges, vec![(0, 16_000), (32_000, 40_000)]);
    }

    #[test]
    fn segments_from_probs_reports_seconds() {
        let probs = [0.9; 32]; // 32 windows of 512 samples = 16384 samples
        let segments = segments_from_probs(&probs, WINDOW, RATE, WINDOW * 32, quiet_policy());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_seconds, 0.0);
        assert!((segments[0].end_seconds - 1.024).abs() < 1e-4);
    }

    #[test]
    fn segments_from_probs_on_silence_is_empty() {
        let probs = [0.0; 16];
        let segments =
            segments_from_probs(&probs, WINDOW, RATE, WINDOW * 16, DEFAULT_VAD_POLICY);
        assert!(segments.is_empty());
    }
}
