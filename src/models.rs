//! Known pretrained-model artifacts.
//!
//! We intentionally keep an allowlist of known-good model exports rather than
//! accepting arbitrary identifiers: the pipeline constructors and the
//! `model-downloader` binary both resolve names against this table, so a typo
//! fails fast with the list of supported names instead of a half-downloaded
//! directory.

use std::path::{Path, PathBuf};

/// Whether a model serves the punctuation task or the VAD task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Punctuation,
    Vad,
}

/// One file belonging to a model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFile {
    /// Filename written to disk inside the model directory.
    pub filename: &'static str,

    /// Full download URL.
    pub url: &'static str,
}

/// Download source for a known model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Whether this is a punctuation model or a VAD model.
    pub kind: ModelKind,

    /// Friendly name users type (e.g. "ct-transformer-zh-en").
    pub name: &'static str,

    /// Files that make up the artifact, stored under `<models-dir>/<name>/`.
    pub files: &'static [ModelFile],
}

// -----------------------------------------------------------------------------
// Punctuation models (allowlist)
//
// ONNX exports of the CT-Transformer punctuation family, published through the
// sherpa-onnx model releases.
// -----------------------------------------------------------------------------
pub static PUNCTUATION_MODELS: &[ModelSpec] = &[ModelSpec {
    kind: ModelKind::Punctuation,
    name: "ct-transformer-zh-en",
    files: &[
        ModelFile {
            filename: "model.onnx",
            url: "https://huggingface.co/csukuangfj/sherpa-onnx-punct-ct-transformer-zh-en-vocab272727-2024-04-12/resolve/main/model.onnx",
        },
        ModelFile {
            filename: "tokens.json",
            url: "https://huggingface.co/csukuangfj/sherpa-onnx-punct-ct-transformer-zh-en-vocab272727-2024-04-12/resolve/main/tokens.json",
        },
    ],
}];

// -----------------------------------------------------------------------------
// VAD models (allowlist)
// -----------------------------------------------------------------------------
pub static VAD_MODELS: &[ModelSpec] = &[
    ModelSpec {
        kind: ModelKind::Vad,
        name: "silero-vad",
        files: &[ModelFile {
            filename: "model.onnx",
            url: "https://github.com/snakers4/silero-vad/raw/master/src/silero_vad/data/silero_vad.onnx",
        }],
    },
    ModelSpec {
        kind: ModelKind::Vad,
        name: "silero-vad-v5",
        files: &[ModelFile {
            filename: "model.onnx",
            url: "https://huggingface.co/onnx-community/silero-vad/resolve/main/onnx/model.onnx",
        }],
    },
];

/// Look up a known model by its friendly name.
pub fn lookup_model(name: &str) -> Option<&'static ModelSpec> {
    PUNCTUATION_MODELS
        .iter()
        .find(|m| m.name == name)
        .or_else(|| VAD_MODELS.iter().find(|m| m.name == name))
}

/// The directory a known model's files live in under `models_dir`.
pub fn local_dir(models_dir: &Path, spec: &ModelSpec) -> PathBuf {
    models_dir.join(spec.name)
}

/// Human-readable listing of every supported model name, grouped by kind.
pub fn model_list_string() -> String {
    let mut out = String::new();

    out.push_str("Punctuation models:\n");
    for m in PUNCTUATION_MODELS {
        out.push_str("  - ");
        out.push_str(m.name);
        out.push('\n');
    }

    out.push('\n');
    out.push_str("VAD models:\n");
    for m in VAD_MODELS {
        out.push_str("  - ");
        out.push_str(m.name);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_model_finds_punctuation_and_vad_specs() {
        let punct = lookup_model("ct-transformer-zh-en").expect("expected punctuation model spec");
        assert_eq!(punct.kind, ModelKind::Punctuation);
        assert!(punct.files.iter().any(|f| f.filename == "tokens.json"));

        let vad = lookup_model("silero-vad").expect("expected silero model spec");
        assert_eq!(vad.kind, ModelKind::Vad);
        assert_eq!(vad.files.len(), 1);

        assert!(lookup_model("definitely-not-a-model").is_none());
    }

    #[test]
    fn model_list_string_includes_sections_and_known_names() {
        let list = model_list_string();
        assert!(list.contains("Punctuation models:\n"));
        assert!(list.contains("  - ct-transformer-zh-en\n"));
        assert!(list.contains("VAD models:\n"));
        assert!(list.contains("  - silero-vad\n"));
    }

    #[test]
    fn local_dir_nests_model_name_under_models_dir() {
        let spec = lookup_model("silero-vad").expect("known model");
        let dir = local_dir(Path::new("./models"), spec);
        assert_eq!(dir, PathBuf::from("./models/silero-vad"));
    }
}
