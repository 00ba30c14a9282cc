use anyhow::Result;
use clap::Parser;

use std::io::{self, BufWriter};
use std::path::PathBuf;

use diction::audio::AudioSource;
use diction::json_array_encoder::JsonArrayEncoder;
use diction::logging;
use diction::pipeline::{self, PipelineConfig};
use diction::segment_encoder::SegmentEncoder;
use diction::task::Task;
use diction::vad::detect_once;

const DEFAULT_AUDIO: &str =
    "https://isv-data.oss-cn-hangzhou.aliyuncs.com/ics/MaaS/ASR/test_audio/vad_example.wav";

fn main() -> Result<()> {
    logging::init();
    let params = Params::parse();

    let mut cfg = PipelineConfig::new(Task::VoiceActivityDetection, params.model.as_str());
    cfg.model_revision = Some(params.model_revision.clone());
    cfg.output_dir = params.output_dir.clone();
    cfg.batch_size = params.batch_size;
    cfg.models_dir = params.models_dir.clone();

    let mut pipeline = pipeline::vad_pipeline(&cfg)?;

    let audio_in = AudioSource::from_spec(&params.audio);
    let segments = detect_once(&mut pipeline, &audio_in)?;

    if let Some(dir) = &cfg.output_dir {
        pipeline::write_segments_output(dir, &segments)?;
    }

    let stdout = io::stdout();
    let mut encoder = JsonArrayEncoder::new(BufWriter::new(stdout.lock()));
    for seg in &segments {
        encoder.write_segment(seg)?;
    }
    encoder.close()?;
    println!();

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "diction-vad")]
#[command(about = "Detect speech activity time ranges in an audio resource")]
struct Params {
    /// Audio resource: an http(s) URL or a local WAV path.
    #[arg(short = 'a', long = "audio", default_value = DEFAULT_AUDIO)]
    pub audio: String,

    /// Model name or path to a model directory.
    #[arg(short = 'm', long = "model", default_value = "silero-vad")]
    pub model: String,

    /// Model revision.
    #[arg(long = "model-revision", default_value = "v1.2.0")]
    pub model_revision: String,

    /// Directory the segment list is written into (disabled when absent).
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Inference batch size.
    #[arg(short = 'b', long = "batch-size", default_value_t = 1)]
    pub batch_size: usize,

    /// Directory known model names resolve under.
    #[arg(long = "models-dir", default_value = "./models")]
    pub models_dir: PathBuf,
}
