//! Pipeline construction.
//!
//! A pipeline is named by a task designator plus a pretrained model
//! identifier, mirroring the construction surface of the upstream inference
//! library: task, model, model revision, output directory, batch size. The
//! constructors here validate the configuration and resolve the model
//! identifier to a local directory before any model loading work happens, so
//! misconfiguration fails fast with a filesystem-level message.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use tracing::debug;

use crate::models::{self, ModelKind};
use crate::punctuation::CtTransformer;
use crate::segment_encoder::SegmentEncoder;
use crate::segments::SpeechSegment;
use crate::task::Task;
use crate::vad::SileroVad;

/// Library-level pipeline configuration.
///
/// This struct represents *library-level configuration*, not CLI flags
/// directly. The CLI drivers are responsible for mapping user input into this
/// type so that other frontends (tests, batch jobs, embedding applications)
/// can construct options programmatically.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The task this pipeline serves.
    pub task: Task,

    /// Pretrained model identifier: either a known model name (resolved under
    /// `models_dir`) or a filesystem path to a model directory.
    pub model: String,

    /// Optional model revision. When `<model-dir>/<revision>/` exists it is
    /// preferred; otherwise the revision is advisory.
    pub model_revision: Option<String>,

    /// Directory results are written into (never read back). `None` disables
    /// result files.
    pub output_dir: Option<PathBuf>,

    /// Inference batch size. Only `1` is supported.
    pub batch_size: usize,

    /// Where known model names resolve to local artifacts.
    pub models_dir: PathBuf,
}

impl PipelineConfig {
    /// Create a configuration with the defaults used by the CLI drivers:
    /// no revision, no output directory, batch size 1, models under
    /// `./models`.
    pub fn new(task: Task, model: impl Into<String>) -> Self {
        Self {
            task,
            model: model.into(),
            model_revision: None,
            output_dir: None,
            batch_size: 1,
            models_dir: PathBuf::from("./models"),
        }
    }
}

/// Construct a punctuation-restoration pipeline.
pub fn punctuation_pipeline(cfg: &PipelineConfig) -> crate::Result<CtTransformer> {
    validate(cfg, Task::Punctuation)?;
    let model_dir = resolve_model_dir(cfg)?;
    Ok(CtTransformer::load(model_dir)?)
}

/// Construct a voice-activity-detection pipeline.
pub fn vad_pipeline(cfg: &PipelineConfig) -> crate::Result<SileroVad> {
    validate(cfg, Task::VoiceActivityDetection)?;
    let model_dir = resolve_model_dir(cfg)?;
    Ok(SileroVad::load(model_dir)?)
}

fn validate(cfg: &PipelineConfig, expected: Task) -> Result<()> {
    ensure!(
        cfg.task == expected,
        "pipeline config is for task '{}', expected '{}'",
        cfg.task,
        expected
    );
    ensure!(
        cfg.batch_size == 1,
        "unsupported batch size {}: only batch size 1 is supported",
        cfg.batch_size
    );
    ensure!(!cfg.model.trim().is_empty(), "model identifier must be provided");
    Ok(())
}

/// Resolve a model identifier to a local model directory.
///
/// A path to an existing directory is used as-is; otherwise the identifier
/// must be a known model name whose files were downloaded under `models_dir`.
fn resolve_model_dir(cfg: &PipelineConfig) -> Result<PathBuf> {
    let direct = Path::new(&cfg.model);
    let base = if direct.is_dir() {
        direct.to_path_buf()
    } else if let Some(spec) = models::lookup_model(&cfg.model) {
        let expected_kind = match cfg.task {
            Task::Punctuation => ModelKind::Punctuation,
            Task::VoiceActivityDetection => ModelKind::Vad,
        };
        ensure!(
            spec.kind == expected_kind,
            "model '{}' does not serve the '{}' task",
            cfg.model,
            cfg.task
        );

        let dir = models::local_dir(&cfg.models_dir, spec);
        if !dir.is_dir() {
            bail!(
                "model '{}' is not downloaded (expected '{}'); fetch it with: model-downloader --name {}",
                cfg.model,
                dir.display(),
                spec.name
            );
        }
        dir
    } else {
        bail!(
            "unknown model '{}': not a directory and not a known model name (run model-downloader --list)",
            cfg.model
        );
    };

    if let Some(revision) = &cfg.model_revision {
        let rev_dir = base.join(revision);
        if rev_dir.is_dir() {
            return Ok(rev_dir);
        }
        debug!(
            revision = %revision,
            "model revision directory not present; using base directory"
        );
    }

    Ok(base)
}

/// Write the accumulated punctuation result under an output directory.
///
/// The file is written for downstream consumers; this crate never reads it
/// back.
pub fn write_punctuation_output(output_dir: &Path, text: &str) -> crate::Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir '{}'", output_dir.display()))?;

    let path = output_dir.join("punctuation.txt");
    fs::write(&path, text)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(path)
}

/// Write a detection segment list as a JSON array under an output directory.
pub fn write_segments_output(
    output_dir: &Path,
    segments: &[SpeechSegment],
) -> crate::Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir '{}'", output_dir.display()))?;

    let path = output_dir.join("segments.json");
    let file = fs::File::create(&path)
        .with_context(|| format!("failed to create '{}'", path.display()))?;

    let mut encoder = crate::json_array_encoder::JsonArrayEncoder::new(BufWriter::new(file));
    for seg in segments {
        encoder.write_segment(seg)?;
    }
    encoder.close()?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with_models_dir(task: Task, model: &str, models_dir: &Path) -> PipelineConfig {
        let mut cfg = PipelineConfig::new(task, model);
        cfg.models_dir = models_dir.to_path_buf();
        cfg
    }

    #[test]
    fn validate_rejects_task_mismatch() {
        let cfg = PipelineConfig::new(Task::Punctuation, "ct-transformer-zh-en");
        let err = validate(&cfg, Task::VoiceActivityDetection).unwrap_err();
        assert!(err.to_string().contains("expected 'voice-activity-detection'"));
    }

    #[test]
    fn validate_rejects_unsupported_batch_size() {
        let mut cfg = PipelineConfig::new(Task::VoiceActivityDetection, "silero-vad");
        cfg.batch_size = 4;
        let err = validate(&cfg, Task::VoiceActivityDetection).unwrap_err();
        assert!(err.to_string().contains("only batch size 1"));
    }

    #[test]
    fn resolve_rejects_unknown_model_names() {
        let cfg = PipelineConfig::new(Task::Punctuation, "definitely-not-a-model");
        let err = resolve_model_dir(&cfg).unwrap_err();
        assert!(err.to_string().contains("unknown model"));
    }

    #[test]
    fn resolve_rejects_kind_mismatch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = cfg_with_models_dir(Task::Punctuation, "silero-vad", dir.path());
        let err = resolve_model_dir(&cfg).unwrap_err();
        assert!(err.to_string().contains("does not serve"));
        Ok(())
    }

    #[test]
    fn resolve_requires_downloaded_known_models() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = cfg_with_models_dir(Task::VoiceActivityDetection, "silero-vad", dir.path());
        let err = resolve_model_dir(&cfg).unwrap_err();
        assert!(err.to_string().contains("not downloaded"));
        Ok(())
    }

    #[test]
    fn resolve_accepts_existing_directories_directly() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = PipelineConfig::new(
            Task::Punctuation,
            dir.path().to_string_lossy().into_owned(),
        );
        assert_eq!(resolve_model_dir(&cfg)?, dir.path());
        Ok(())
    }

    #[test]
    fn resolve_prefers_revision_subdirectory_when_present() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("v1.0.0"))?;

        let mut cfg = PipelineConfig::new(
            Task::Punctuation,
            dir.path().to_string_lossy().into_owned(),
        );
        cfg.model_revision = Some("v1.0.0".to_owned());
        assert_eq!(resolve_model_dir(&cfg)?, dir.path().join("v1.0.0"));

        cfg.model_revision = Some("v9.9.9".to_owned());
        assert_eq!(resolve_model_dir(&cfg)?, dir.path());
        Ok(())
    }

    #[test]
    fn write_punctuation_output_writes_text_verbatim() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_punctuation_output(dir.path(), "outputs:你好。")?;
        assert_eq!(fs::read_to_string(path)?, "outputs:你好。");
        Ok(())
    }

    #[test]
    fn write_segments_output_writes_a_json_array() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let segments = vec![
            SpeechSegment {
                start_seconds: 0.5,
                end_seconds: 1.5,
            },
            SpeechSegment {
                start_seconds: 2.0,
                end_seconds: 3.0,
            },
        ];

        let path = write_segments_output(dir.path(), &segments)?;
        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        let arr = parsed.as_array().expect("expected JSON array");
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[1]["start_seconds"], 2.0);
        Ok(())
    }
}
