//! Audio fetching and normalization.
//!
//! Responsibilities:
//! - Resolve an audio reference (remote URL or local path) into raw WAV bytes
//! - Decode WAV PCM into `f32` samples
//! - Downmix to mono
//! - Resample to the detection target rate (when needed)
//!
//! The detection pipeline consumes mono 16 kHz `f32` samples; everything here
//! exists to turn an arbitrary WAV resource into that shape.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use hound::{SampleFormat, WavReader};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use tracing::debug;

/// Diction's target mono sample rate (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// An audio resource reference.
///
/// The detection driver passes this through to the pipeline unmodified; the
/// pipeline decides how to materialize it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A remotely hosted resource, fetched over HTTP(S).
    Url(String),

    /// A local filesystem path.
    Path(PathBuf),
}

impl AudioSource {
    /// Interpret a CLI-style string: anything with an `http(s)://` scheme is a
    /// URL, everything else is a local path.
    pub fn from_spec(spec: &str) -> Self {
        if spec.starts_with("http://") || spec.starts_with("https://") {
            AudioSource::Url(spec.to_owned())
        } else {
            AudioSource::Path(PathBuf::from(spec))
        }
    }
}

impl std::fmt::Display for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioSource::Url(url) => f.write_str(url),
            AudioSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load an audio resource and normalize it to mono 16 kHz `f32` samples.
pub fn load_samples_16k_mono(source: &AudioSource) -> Result<Vec<f32>> {
    let (interleaved, sample_rate, channels) = match source {
        AudioSource::Url(url) => {
            debug!(url = %url, "fetching remote audio");
            let bytes = fetch_bytes(url)?;
            decode_wav(Cursor::new(bytes))
                .with_context(|| format!("failed to decode WAV fetched from '{url}'"))?
        }
        AudioSource::Path(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open audio file '{}'", path.display()))?;
            decode_wav(file)
                .with_context(|| format!("failed to decode WAV file '{}'", path.display()))?
        }
    };

    let mono = downmix_to_mono(&interleaved, channels);

    if sample_rate == TARGET_SAMPLE_RATE {
        return Ok(mono);
    }

    debug!(sample_rate, "resampling to target rate");
    resample_to_target(&mono, sample_rate)
}

/// Fetch a URL into memory with a blocking HTTP client.
fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .user_agent("diction-audio-fetch")
        .build()
        .context("failed to build HTTP client")?;

    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("request failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("fetch failed (bad status): {url}"))?;

    let bytes = resp
        .bytes()
        .with_context(|| format!("failed to read response body: {url}"))?;

    Ok(bytes.to_vec())
}

/// Decode WAV audio from a reader into interleaved `f32` samples.
///
/// What we return:
/// - Interleaved samples normalized to `[-1.0, 1.0]`
/// - The source sample rate and channel count, so callers can downmix/resample
///
/// Supported encodings are 16-bit integer PCM and 32-bit float PCM; other
/// bit depths are rejected with a clear error rather than silently rescaled.
pub fn decode_wav<R>(reader: R) -> Result<(Vec<f32>, u32, usize)>
where
    R: Read + Seek,
{
    let mut reader = WavReader::new(reader).context("failed to read WAV data from reader")?;
    let spec = reader.spec();

    if spec.channels == 0 {
        bail!("WAV header reported zero channels");
    }

    let mut samples = Vec::new();
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => {
            for sample in reader.samples::<i16>() {
                let pcm = sample.context("failed to read PCM sample")?;
                samples.push(pcm as f32 / i16::MAX as f32);
            }
        }
        (SampleFormat::Float, 32) => {
            for sample in reader.samples::<f32>() {
                samples.push(sample.context("failed to read float sample")?);
            }
        }
        (format, bits) => {
            bail!("unsupported WAV encoding: {format:?} at {bits} bits per sample");
        }
    }

    Ok((samples, spec.sample_rate, spec.channels as usize))
}

/// Downmix interleaved samples into mono by averaging channels.
///
/// Policy: equal-weight average across channels (simple, predictable).
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    let frames = interleaved.len() / channels;
    let mut mono = Vec::with_capacity(frames);

    for f in 0..frames {
        let base = f * channels;
        let mut acc = 0.0;
        for c in 0..channels {
            acc += interleaved[base + c];
        }
        mono.push(acc / channels as f32);
    }

    mono
}

/// Resample a complete mono buffer to [`TARGET_SAMPLE_RATE`].
///
/// rubato expects exact block sizes, so the tail is zero-padded to a full
/// block and the output trimmed back to the expected sample count.
pub fn resample_to_target(mono_src: &[f32], src_rate: u32) -> Result<Vec<f32>> {
    if src_rate == 0 {
        bail!("source sample rate must be non-zero");
    }
    if mono_src.is_empty() {
        return Ok(Vec::new());
    }

    // How many source frames we feed rubato per `process()` call.
    let in_chunk_src_frames = 2048;

    let mut rs = SincFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / src_rate as f64,
        2.0,
        rubato::SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: rubato::SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        },
        in_chunk_src_frames,
        1, // mono
    )
    .map_err(|e| anyhow!(e))
    .context("failed to init resampler")?;

    let in_max = rs.input_frames_max();
    let mut padded = mono_src.to_vec();
    let rem = padded.len() % in_max;
    if rem != 0 {
        padded.resize(padded.len() + (in_max - rem), 0.0);
    }

    let mut out = Vec::with_capacity(
        (padded.len() as f64 * TARGET_SAMPLE_RATE as f64 / src_rate as f64) as usize + in_max,
    );

    for block in padded.chunks(in_max) {
        let input = vec![block.to_vec()];
        let processed = rs
            .process(&input, None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        if processed.len() != 1 {
            bail!("expected mono output from resampler");
        }
        out.extend_from_slice(&processed[0]);
    }

    // Trim the zero-pad overshoot back to the expected duration.
    let expected =
        (mono_src.len() as u64 * TARGET_SAMPLE_RATE as u64 / src_rate as u64) as usize;
    out.truncate(expected);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("create WAV writer");
            for &s in samples {
                writer.write_sample(s).expect("write sample");
            }
            writer.finalize().expect("finalize WAV");
        }
        cursor.into_inner()
    }

    #[test]
    fn from_spec_distinguishes_urls_from_paths() {
        assert_eq!(
            AudioSource::from_spec("https://example.com/a.wav"),
            AudioSource::Url("https://example.com/a.wav".to_owned())
        );
        assert_eq!(
            AudioSource::from_spec("./local/a.wav"),
            AudioSource::Path(PathBuf::from("./local/a.wav"))
        );
    }

    #[test]
    fn decode_wav_normalizes_i16_pcm() -> anyhow::Result<()> {
        let bytes = wav_bytes(16_000, 1, &[0, i16::MAX, i16::MIN + 1]);
        let (samples, rate, channels) = decode_wav(Cursor::new(bytes))?;

        assert_eq!(rate, 16_000);
        assert_eq!(channels, 1);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 1.0).abs() < 1e-6);
        assert!((samples[2] + 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn decode_wav_rejects_unsupported_bit_depth() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("create WAV writer");
            writer.write_sample(0i8).expect("write sample");
            writer.finalize().expect("finalize WAV");
        }

        let err = decode_wav(Cursor::new(cursor.into_inner())).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported WAV encoding"));
    }

    #[test]
    fn downmix_to_mono_single_channel_is_identity() {
        let input = vec![0.0, 1.0, -1.0];
        let mono = downmix_to_mono(&input, 1);
        assert_eq!(mono, input);
    }

    #[test]
    fn downmix_to_mono_averages_channels() {
        // Two frames of stereo: (L=1, R=3), (L=-1, R=1) => mono: 2, 0
        let interleaved = vec![1.0, 3.0, -1.0, 1.0];
        let mono = downmix_to_mono(&interleaved, 2);
        assert_eq!(mono, vec![2.0, 0.0]);
    }

    #[test]
    fn resample_doubles_sample_count_from_8k() -> anyhow::Result<()> {
        let mono = vec![0.25f32; 3000];
        let out = resample_to_target(&mono, 8_000)?;
        assert_eq!(out.len(), 6000);
        Ok(())
    }

    #[test]
    fn resample_empty_input_is_empty() -> anyhow::Result<()> {
        assert!(resample_to_target(&[], 8_000)?.is_empty());
        Ok(())
    }

    #[test]
    fn load_samples_decodes_local_16k_wav_without_resampling() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, wav_bytes(16_000, 1, &[100, -100, 100, -100]))?;

        let samples = load_samples_16k_mono(&AudioSource::Path(path))?;
        assert_eq!(samples.len(), 4);
        Ok(())
    }
}
