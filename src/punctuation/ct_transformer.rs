use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::Tensor;
use ort::value::ValueType;
use tracing::debug;

use super::{CachedToken, PunctCache, PunctuationPipeline, Restored};

/// Punctuation inventory for CT-Transformer `vocab272727` exports.
///
/// Notes:
/// - Index 0 is reserved for the unknown class.
/// - Index 1 is the "no punctuation" class.
/// - The remaining entries are appended verbatim after the token they follow.
const PUNCTUATION_TABLE: &[&str] = &["", "", "，", "。", "？", "、"];

/// Marks that terminate a sentence. Tokens after the last of these are carried
/// into the next call's cache so an unterminated sentence keeps its context.
const SENTENCE_ENDINGS: &[&str] = &["。", "？", "！", ".", "?", "!"];

/// Vocab entry used when a token has no id in the model vocabulary.
const UNK_TOKEN: &str = "<unk>";

/// Maximum number of tokens carried across calls.
///
/// The realtime model only needs the tail of the current sentence; an
/// unbounded carry would grow the input on pathological unpunctuated text.
const DEFAULT_CACHE_LIMIT_TOKENS: usize = 20;

/// Punctuation-restoration backend running a CT-Transformer ONNX export.
///
/// The model directory must contain `model.onnx` and `tokens.json` (the
/// sherpa-onnx export layout of the original DAMO model family).
#[derive(Debug)]
pub struct CtTransformer {
    session: Session,
    vocab: HashMap<String, i64>,
    unk_id: i64,
    cache_limit: usize,
}

impl CtTransformer {
    /// Load a CT-Transformer export from a model directory.
    ///
    /// We fail fast on filesystem problems so that once `load` succeeds, every
    /// later failure is an inference failure rather than a misconfiguration.
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        ensure!(
            model_dir.is_dir(),
            "punctuation model directory not found at '{}'",
            model_dir.display()
        );

        let model_path = model_dir.join("model.onnx");
        ensure!(
            model_path.is_file(),
            "punctuation model file not found at '{}'",
            model_path.display()
        );

        let vocab_path = model_dir.join("tokens.json");
        ensure!(
            vocab_path.is_file(),
            "punctuation vocab file not found at '{}'",
            vocab_path.display()
        );

        let vocab = load_vocab(&vocab_path)?;
        ensure!(
            !vocab.is_empty(),
            "punctuation vocab '{}' contained no tokens",
            vocab_path.display()
        );
        let unk_id = vocab.get(UNK_TOKEN).copied().unwrap_or(0);

        let session = Session::builder()
            .context("failed to create ONNX Runtime session builder")?
            .with_intra_threads(num_cpus::get())
            .context("failed to configure session threads")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "failed to load CT-Transformer ONNX model from '{}'",
                    model_path.display()
                )
            })?;

        Ok(Self {
            session,
            vocab,
            unk_id,
            cache_limit: DEFAULT_CACHE_LIMIT_TOKENS,
        })
    }

    fn token_id(&self, token: &str) -> i64 {
        // English tokens are matched case-insensitively; the vocab stores them
        // lowercased.
        self.vocab
            .get(token)
            .or_else(|| self.vocab.get(token.to_lowercase().as_str()))
            .copied()
            .unwrap_or(self.unk_id)
    }

    /// Run the model over a token-id sequence and return one punctuation class
    /// per token.
    fn infer_classes(&mut self, ids: &[i64]) -> Result<Vec<usize>> {
        let seq_len = ids.len();
        let inputs = build_session_inputs(&self.session, ids)?;

        let classes = {
            let outputs = self
                .session
                .run(inputs)
                .context("failed to run CT-Transformer ONNX model")?;

            ensure!(
                outputs.len() >= 1,
                "CT-Transformer model produced no outputs"
            );

            let (shape, logits) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("failed to extract punctuation logits")?;
            let dims: Vec<i64> = shape.iter().copied().collect();
            argmax_per_token(&dims, logits, seq_len)?
        };

        Ok(classes)
    }
}

impl PunctuationPipeline for CtTransformer {
    type Cache = PunctCache;

    /// Restore punctuation for one fragment, carrying sentence context.
    ///
    /// The tokens held in `cache` are prepended to the fragment's tokens so
    /// the model sees the unterminated sentence they belong to; only the
    /// fragment's own tokens contribute to the returned text.
    fn restore(&mut self, text_in: &str, cache: PunctCache) -> crate::Result<Restored<PunctCache>> {
        let new_tokens: Vec<CachedToken> = tokenize(text_in)
            .into_iter()
            .map(|text| {
                let id = self.token_id(&text);
                CachedToken { text, id }
            })
            .collect();

        // The upstream model's behavior on empty input is undefined; we make
        // ours explicit: identity text, context unchanged, no inference run.
        if new_tokens.is_empty() {
            return Ok(Restored {
                text: String::new(),
                cache,
            });
        }

        let carried = cache.tokens.len();
        let mut combined = cache.tokens;
        combined.extend(new_tokens);

        let ids: Vec<i64> = combined.iter().map(|t| t.id).collect();
        let classes = self.infer_classes(&ids)?;
        debug!(
            tokens = combined.len(),
            carried, "restored punctuation for fragment"
        );

        let text = assemble_text(&combined, &classes, carried);
        let cache = carry_cache(&combined, &classes, self.cache_limit);

        Ok(Restored { text, cache })
    }
}

/// Split raw text into model tokens.
///
/// ASCII alphanumeric runs (plus apostrophes) form one word token; any other
/// non-whitespace character is a token on its own. CJK text therefore
/// tokenizes per character, which is what the vocab expects.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '\'' {
            word.push(c);
            continue;
        }

        if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }

    if !word.is_empty() {
        tokens.push(word);
    }

    tokens
}

/// Reassemble text for tokens at `emit_from..`, appending each token's
/// predicted punctuation mark.
///
/// Spacing rule: a space is inserted between two ASCII word tokens only when
/// no punctuation mark was emitted between them.
fn assemble_text(tokens: &[CachedToken], classes: &[usize], emit_from: usize) -> String {
    let mut out = String::new();
    let mut pending_space = false;

    for (token, &class) in tokens.iter().zip(classes).skip(emit_from) {
        let is_word = token.text.chars().all(|c| c.is_ascii_alphanumeric() || c == '\'');
        if pending_space && is_word {
            out.push(' ');
        }

        out.push_str(&token.text);

        let mark = PUNCTUATION_TABLE.get(class).copied().unwrap_or("");
        out.push_str(mark);

        pending_space = is_word && mark.is_empty();
    }

    out
}

/// Compute the cache to carry into the next call: every token after the last
/// sentence-ending mark, bounded by `limit` most-recent tokens.
fn carry_cache(tokens: &[CachedToken], classes: &[usize], limit: usize) -> PunctCache {
    let mut carry_from = 0;
    for (i, &class) in classes.iter().enumerate().take(tokens.len()) {
        let mark = PUNCTUATION_TABLE.get(class).copied().unwrap_or("");
        if SENTENCE_ENDINGS.contains(&mark) {
            carry_from = i + 1;
        }
    }

    let tail = &tokens[carry_from.min(tokens.len())..];
    let keep_from = tail.len().saturating_sub(limit);

    PunctCache {
        tokens: tail[keep_from..].to_vec(),
    }
}

/// Build named session inputs for a token-id sequence.
///
/// We prefer named inputs so exports with an explicit lengths tensor work
/// without relying on ordering. The common CT-Transformer signatures are:
/// - inputs: ["x"] (token ids)
/// - inputs: ["x", "text_lengths"] (token ids + valid lengths)
fn build_session_inputs(
    session: &Session,
    ids: &[i64],
) -> Result<Vec<(String, ort::session::SessionInputValue<'static>)>> {
    let seq_len = ids.len();
    let mut text_input: Option<(String, TensorElementType)> = None;
    let mut length_input: Option<(String, TensorElementType)> = None;

    for input in &session.inputs {
        let ValueType::Tensor { ty, .. } = input.input_type else {
            return Err(anyhow!(
                "CT-Transformer input '{}' is not a tensor: {}",
                input.name,
                input.input_type
            ));
        };

        if input.name.contains("len") {
            length_input = Some((input.name.clone(), ty));
            continue;
        }

        if text_input.is_some() {
            return Err(anyhow!(
                "CT-Transformer model has multiple non-length inputs; unsupported: {:?}",
                session
                    .inputs
                    .iter()
                    .map(|i| i.name.as_str())
                    .collect::<Vec<_>>()
            ));
        }
        text_input = Some((input.name.clone(), ty));
    }

    let (text_name, text_ty) =
        text_input.ok_or_else(|| anyhow!("CT-Transformer model has no token input"))?;

    let mut inputs: Vec<(String, ort::session::SessionInputValue<'static>)> = Vec::new();

    let text_value = match text_ty {
        TensorElementType::Int32 => {
            let ids_i32: Vec<i32> = ids.iter().map(|&v| v as i32).collect();
            Tensor::from_array(([1usize, seq_len], ids_i32.into_boxed_slice()))
                .context("failed to build token input tensor (i32)")?
                .into_dyn()
        }
        TensorElementType::Int64 => {
            Tensor::from_array(([1usize, seq_len], ids.to_vec().into_boxed_slice()))
                .context("failed to build token input tensor (i64)")?
                .into_dyn()
        }
        other => {
            return Err(anyhow!(
                "unsupported token input tensor element type: {other}"
            ));
        }
    };
    inputs.push((
        text_name,
        ort::session::SessionInputValue::Owned(text_value),
    ));

    if let Some((name, ty)) = length_input {
        let len = seq_len as i64;
        let len_value = match ty {
            TensorElementType::Int32 => {
                Tensor::from_array(([1usize], vec![len as i32].into_boxed_slice()))
                    .context("failed to build lengths input tensor (i32)")?
                    .into_dyn()
            }
            TensorElementType::Int64 => {
                Tensor::from_array(([1usize], vec![len].into_boxed_slice()))
                    .context("failed to build lengths input tensor (i64)")?
                    .into_dyn()
            }
            other => {
                return Err(anyhow!(
                    "unsupported lengths input tensor element type: {other}"
                ));
            }
        };
        inputs.push((name, ort::session::SessionInputValue::Owned(len_value)));
    }

    Ok(inputs)
}

/// Argmax punctuation logits of shape `[1, time, classes]` (or `[time,
/// classes]`) into one class per token.
fn argmax_per_token(shape: &[i64], logits: &[f32], seq_len: usize) -> Result<Vec<usize>> {
    let dims: Vec<usize> = shape
        .iter()
        .map(|d| {
            (*d).try_into()
                .map_err(|_| anyhow!("logits shape contained a negative dimension: {d}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let (time, classes) = match dims.as_slice() {
        [time, classes] => (*time, *classes),
        [batch, time, classes] if *batch == 1 => (*time, *classes),
        _ => {
            return Err(anyhow!(
                "unsupported punctuation logits shape {:?} (expected [time, classes] or [1, time, classes])",
                dims
            ));
        }
    };

    ensure!(
        time == seq_len,
        "model returned {time} token rows for {seq_len} input tokens"
    );
    ensure!(classes > 0, "punctuation logits had zero classes");
    ensure!(
        logits.len() >= time * classes,
        "logits buffer too small for shape [{time}, {classes}] (len={})",
        logits.len()
    );

    let mut out = Vec::with_capacity(time);
    for t in 0..time {
        let row = &logits[t * classes..(t + 1) * classes];

        let mut best_i = 0usize;
        let mut best_v = f32::NEG_INFINITY;
        for (i, &v) in row.iter().enumerate() {
            if v > best_v {
                best_v = v;
                best_i = i;
            }
        }
        out.push(best_i);
    }

    Ok(out)
}

/// Load a token -> id vocabulary.
///
/// Supported formats:
/// - JSON object mapping token strings to integer ids
/// - JSON array of strings (id = array index)
/// - JSON object with a `labels` or `tokens` array
/// - Newline-delimited tokens (id = line number)
fn load_vocab(path: &Path) -> Result<HashMap<String, i64>> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read vocab file '{}'", path.display()))?;
    let s = String::from_utf8(bytes).context("vocab file was not valid UTF-8")?;

    parse_vocab_text(&s).with_context(|| format!("failed to parse vocab file '{}'", path.display()))
}

fn parse_vocab_text(s: &str) -> Result<HashMap<String, i64>> {
    let trimmed = s.trim_start();

    if (trimmed.starts_with('[') || trimmed.starts_with('{'))
        && let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed)
    {
        if let Some(arr) = v.as_array() {
            return Ok(indexed_vocab(
                arr.iter().filter_map(|x| x.as_str().map(str::to_owned)),
            ));
        }

        if let Some(obj) = v.as_object() {
            for key in ["labels", "tokens"] {
                if let Some(arr) = obj.get(key).and_then(|x| x.as_array()) {
                    return Ok(indexed_vocab(
                        arr.iter().filter_map(|x| x.as_str().map(str::to_owned)),
                    ));
                }
            }

            // Direct token -> id mapping.
            let mut vocab = HashMap::with_capacity(obj.len());
            for (token, id) in obj {
                let id = id
                    .as_i64()
                    .ok_or_else(|| anyhow!("vocab entry '{token}' has a non-integer id"))?;
                vocab.insert(token.clone(), id);
            }
            return Ok(vocab);
        }
    }

    // Fallback: newline-delimited.
    Ok(indexed_vocab(
        s.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned),
    ))
}

fn indexed_vocab(tokens: impl Iterator<Item = String>) -> HashMap<String, i64> {
    tokens
        .enumerate()
        .map(|(i, token)| (token, i as i64))
        .collect()
}
