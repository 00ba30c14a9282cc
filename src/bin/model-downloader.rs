// A small CLI utility to download known punctuation and VAD model artifacts
// into a target directory.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use diction::models::{self, ModelKind};

#[derive(Parser, Debug)]
#[command(name = "model-downloader")]
#[command(about = "Download punctuation and VAD models for Diction", long_about = None)]
struct Args {
    /// List supported model names and exit.
    #[arg(long)]
    list: bool,

    /// Model name (examples: ct-transformer-zh-en, silero-vad)
    ///
    /// We intentionally keep an allowlist of known-good model artifacts.
    #[arg(long, required_unless_present = "list")]
    name: Option<String>,

    /// Target directory to store models (created if missing).
    #[arg(long, default_value = "./models")]
    dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list {
        print!("{}", models::model_list_string());
        return Ok(());
    }

    let name = args.name.as_deref().expect("clap should require --name");

    let spec = models::lookup_model(name).with_context(|| {
        format!("unknown model '{name}'. Run with --list to see supported models.")
    })?;

    let model_dir = models::local_dir(&args.dir, spec);
    fs::create_dir_all(&model_dir)
        .with_context(|| format!("failed to create model dir: {}", model_dir.display()))?;

    let client = Client::builder()
        .user_agent("diction-model-downloader")
        .build()
        .context("failed to build HTTP client")?;

    for file in spec.files {
        let dest_path = model_dir.join(file.filename);

        if dest_path.exists() {
            println!("✅ already exists: {}", dest_path.display());
            continue;
        }

        println!(
            "⬇️  downloading {} ({})",
            file.filename,
            match spec.kind {
                ModelKind::Punctuation => "punctuation",
                ModelKind::Vad => "vad",
            }
        );
        println!("    {}", file.url);

        download_to_path(&client, file.url, &dest_path)?;

        println!("✅ saved: {}", dest_path.display());
    }

    Ok(())
}

/// Download a URL into `dest_path` safely:
/// - download to `dest_path.part`
/// - fsync + rename to final path
fn download_to_path(client: &Client, url: &str, dest_path: &Path) -> Result<()> {
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("request failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("download failed (bad status): {url}"))?;

    let total = resp.content_length();
    download_to_path_with_reader(resp, total, dest_path)
}

fn download_to_path_with_reader<R: Read>(
    mut reader: R,
    total_bytes: Option<u64>,
    dest_path: &Path,
) -> Result<()> {
    let total = total_bytes.unwrap_or(0);

    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {bytes}/{total_bytes} {bar:40.cyan/blue} {eta}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let tmp_path = PathBuf::from(format!("{}.part", dest_path.display()));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            pb.inc(n as u64);
        }

        file.sync_all()?;
        pb.finish_and_clear();

        fs::rename(&tmp_path, dest_path)
            .with_context(|| format!("failed to move into place: {}", dest_path.display()))?;

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
        pb.finish_and_clear();
    }

    result
}
