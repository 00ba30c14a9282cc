use anyhow::Result;
use clap::Parser;

use std::path::PathBuf;

use diction::logging;
use diction::pipeline::{self, PipelineConfig};
use diction::punctuation::restore_delimited;
use diction::task::Task;

/// Demo document: unpunctuated speech-recognition output, pre-segmented with
/// `|` at the original VAD boundaries.
const DEFAULT_DOCUMENT: &str = "跨境河流是养育沿岸|人民的生命之源长期以来为帮助下游地区防灾减灾中方技术人员|在上游地区极为恶劣的自然条件下克服巨大困难甚至冒着生命危险|向印方提供汛期水文资料处理紧急事件中方重视印方在跨境河流问题上的关切|愿意进一步完善双方联合工作机制|凡是|中方能做的我们|都会去做而且会做得更好我请印度朋友们放心中国在上游的|任何开发利用都会经过科学|规划和论证兼顾上下游的利益";

fn main() -> Result<()> {
    logging::init();
    let params = Params::parse();

    let mut cfg = PipelineConfig::new(Task::Punctuation, params.model.as_str());
    cfg.model_revision = Some(params.model_revision.clone());
    cfg.output_dir = Some(params.output_dir.clone());
    cfg.models_dir = params.models_dir.clone();

    let mut pipeline = pipeline::punctuation_pipeline(&cfg)?;
    let result = restore_delimited(&mut pipeline, &params.text)?;

    if let Some(dir) = &cfg.output_dir {
        pipeline::write_punctuation_output(dir, &result)?;
    }

    println!("{result}");
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "diction-punctuate")]
#[command(about = "Restore punctuation in delimited speech-recognition text")]
struct Params {
    /// Input document; fragments are separated by `|`.
    #[arg(short = 'i', long = "text", default_value = DEFAULT_DOCUMENT)]
    pub text: String,

    /// Model name or path to a model directory.
    #[arg(short = 'm', long = "model", default_value = "ct-transformer-zh-en")]
    pub model: String,

    /// Model revision.
    #[arg(long = "model-revision", default_value = "v1.0.0")]
    pub model_revision: String,

    /// Directory the accumulated result is written into.
    #[arg(short = 'o', long = "output-dir", default_value = "./tmp/")]
    pub output_dir: PathBuf,

    /// Directory known model names resolve under.
    #[arg(long = "models-dir", default_value = "./models")]
    pub models_dir: PathBuf,
}
