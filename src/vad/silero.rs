use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::Tensor;
use ort::value::ValueType;
use tracing::debug;

use super::VadPipeline;
use super::policy::{DEFAULT_VAD_POLICY, VadPolicy, segments_from_probs};
use crate::audio::{AudioSource, TARGET_SAMPLE_RATE, load_samples_16k_mono};
use crate::segments::SpeechSegment;

/// Analysis window fed to the model per inference call.
///
/// Silero-style exports expect 512-sample windows at 16 kHz; shorter final
/// windows are zero-padded.
const WINDOW_SAMPLES: usize = 512;

/// Voice-activity-detection backend running a silero-style stateful ONNX
/// export.
///
/// Target model signature: inputs `input` (audio) + `state` + `sr`, outputs a
/// per-window speech probability and an updated `stateN`. The recurrent state
/// is threaded across windows within one detection pass and reset between
/// resources.
#[derive(Debug)]
pub struct SileroVad {
    session: Session,
    policy: VadPolicy,
}

/// Owned recurrent state threaded between window inferences.
struct RecurrentState {
    dims: Vec<usize>,
    data: Vec<f32>,
}

impl SileroVad {
    /// Load a VAD export from a model directory.
    ///
    /// We fail fast on filesystem problems so that once `load` succeeds, every
    /// later failure is an inference failure rather than a misconfiguration.
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        ensure!(
            model_dir.is_dir(),
            "VAD model directory not found at '{}'",
            model_dir.display()
        );

        let model_path = model_dir.join("model.onnx");
        ensure!(
            model_path.is_file(),
            "VAD model file not found at '{}'",
            model_path.display()
        );

        let session = Session::builder()
            .context("failed to create ONNX Runtime session builder")?
            .with_intra_threads(num_cpus::get())
            .context("failed to configure session threads")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "failed to load VAD ONNX model from '{}'",
                    model_path.display()
                )
            })?;

        let has_state = session.inputs.iter().any(|i| i.name == "state");
        let has_sr = session.inputs.iter().any(|i| i.name == "sr");
        if !has_state || !has_sr {
            return Err(anyhow!(
                "the provided ONNX model does not look like a silero-style VAD export (expected `state` and `sr` inputs); got inputs {:?}",
                session
                    .inputs
                    .iter()
                    .map(|i| i.name.as_str())
                    .collect::<Vec<_>>()
            ));
        }

        Ok(Self {
            session,
            policy: DEFAULT_VAD_POLICY,
        })
    }

    /// Replace the segment-selection policy.
    pub fn with_policy(mut self, policy: VadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the model over every analysis window, threading the recurrent state.
    fn window_probs(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let mut probs = Vec::with_capacity(samples.len() / WINDOW_SAMPLES + 1);
        let mut state = initial_state(&self.session)?;

        for chunk in samples.chunks(WINDOW_SAMPLES) {
            let window = if chunk.len() == WINDOW_SAMPLES {
                chunk.to_vec()
            } else {
                let mut padded = chunk.to_vec();
                padded.resize(WINDOW_SAMPLES, 0.0);
                padded
            };

            let (prob, next_state) = self.run_window(&window, &state)?;
            probs.push(prob);
            state = next_state;
        }

        Ok(probs)
    }

    fn run_window(&mut self, window: &[f32], state: &RecurrentState) -> Result<(f32, RecurrentState)> {
        let inputs = build_session_inputs(&self.session, window, state)?;
        let (prob_idx, state_idx) = output_indexes(&self.session)?;

        let outputs = self
            .session
            .run(inputs)
            .context("failed to run VAD ONNX model")?;

        let (_, prob_values) = outputs[prob_idx]
            .try_extract_tensor::<f32>()
            .context("failed to extract speech probability")?;
        let prob = *prob_values
            .first()
            .ok_or_else(|| anyhow!("VAD model returned an empty probability tensor"))?;

        let (state_shape, state_values) = outputs[state_idx]
            .try_extract_tensor::<f32>()
            .context("failed to extract updated VAD state")?;
        let dims: Vec<usize> = state_shape
            .iter()
            .map(|d| {
                (*d).try_into()
                    .map_err(|_| anyhow!("state shape dimension did not fit in usize: {d}"))
            })
            .collect::<Result<_>>()?;

        let next_state = RecurrentState {
            dims,
            data: state_values.to_vec(),
        };

        Ok((prob, next_state))
    }
}

impl VadPipeline for SileroVad {
    fn detect(&mut self, audio_in: &AudioSource) -> crate::Result<Vec<SpeechSegment>> {
        let samples = load_samples_16k_mono(audio_in)?;
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let probs = self.window_probs(&samples)?;
        let segments = segments_from_probs(
            &probs,
            WINDOW_SAMPLES,
            TARGET_SAMPLE_RATE,
            samples.len(),
            self.policy,
        );
        debug!(
            windows = probs.len(),
            segments = segments.len(),
            "detected speech activity"
        );

        Ok(segments)
    }
}

/// Zeroed recurrent state matching the model's declared `state` input shape.
///
/// Dynamic dimensions (reported as `-1`) are resolved to `1`.
fn initial_state(session: &Session) -> Result<RecurrentState> {
    let input = session
        .inputs
        .iter()
        .find(|i| i.name == "state")
        .ok_or_else(|| anyhow!("VAD model has no 'state' input"))?;

    let ValueType::Tensor { ty, ref shape, .. } = input.input_type else {
        return Err(anyhow!(
            "VAD input 'state' is not a tensor: {}",
            input.input_type
        ));
    };
    ensure!(
        ty == TensorElementType::Float32,
        "unsupported 'state' input tensor element type: {ty}"
    );

    let dims: Vec<usize> = shape
        .iter()
        .map(|d| {
            if *d < 0 {
                Ok(1usize)
            } else {
                (*d).try_into()
                    .map_err(|_| anyhow!("state shape dimension did not fit in usize: {d}"))
            }
        })
        .collect::<Result<_>>()?;

    let numel = dims.iter().copied().product::<usize>();
    Ok(RecurrentState {
        dims,
        data: vec![0.0; numel],
    })
}

/// Build named session inputs for one analysis window.
///
/// We prefer named inputs so the audio tensor lands correctly regardless of
/// declaration order; `state` and `sr` are matched by name.
fn build_session_inputs(
    session: &Session,
    window: &[f32],
    state: &RecurrentState,
) -> Result<Vec<(String, ort::session::SessionInputValue<'static>)>> {
    let mut audio_input_name: Option<String> = None;
    let mut sr_input: Option<(String, TensorElementType)> = None;

    for input in &session.inputs {
        if input.name == "sr" {
            let ValueType::Tensor { ty, .. } = input.input_type else {
                return Err(anyhow!(
                    "VAD input 'sr' is not a tensor: {}",
                    input.input_type
                ));
            };
            sr_input = Some((input.name.clone(), ty));
            continue;
        }

        if input.name == "state" {
            continue;
        }

        if audio_input_name.is_some() {
            return Err(anyhow!(
                "VAD model has multiple audio inputs; unsupported: {:?}",
                session
                    .inputs
                    .iter()
                    .map(|i| i.name.as_str())
                    .collect::<Vec<_>>()
            ));
        }
        audio_input_name = Some(input.name.clone());
    }

    let audio_name = audio_input_name.unwrap_or_else(|| "input".to_owned());

    // We need `SessionInputValue<'static>` for the Vec conversion; use owned values.
    let mut inputs: Vec<(String, ort::session::SessionInputValue<'static>)> = Vec::new();

    let audio = Tensor::from_array(([1usize, window.len()], window.to_vec().into_boxed_slice()))
        .context("failed to build audio input tensor")?;
    inputs.push((
        audio_name,
        ort::session::SessionInputValue::Owned(audio.into_dyn()),
    ));

    let state_value = Tensor::from_array((
        state.dims.clone(),
        state.data.clone().into_boxed_slice(),
    ))
    .context("failed to build 'state' input tensor")?;
    inputs.push((
        "state".to_owned(),
        ort::session::SessionInputValue::Owned(state_value.into_dyn()),
    ));

    if let Some((name, ty)) = sr_input {
        let sr = TARGET_SAMPLE_RATE as i64;
        let sr_value = match ty {
            TensorElementType::Int64 => Tensor::from_array(((), vec![sr].into_boxed_slice()))
                .context("failed to build 'sr' input tensor (i64)")?
                .into_dyn(),
            TensorElementType::Int32 => {
                Tensor::from_array(((), vec![sr as i32].into_boxed_slice()))
                    .context("failed to build 'sr' input tensor (i32)")?
                    .into_dyn()
            }
            other => {
                return Err(anyhow!(
                    "unsupported 'sr' input tensor element type: {other}"
                ));
            }
        };
        inputs.push((name, ort::session::SessionInputValue::Owned(sr_value)));
    }

    Ok(inputs)
}

/// Locate the probability and state outputs by name.
fn output_indexes(session: &Session) -> Result<(usize, usize)> {
    let mut prob_idx: Option<usize> = None;
    let mut state_idx: Option<usize> = None;

    for (i, output) in session.outputs.iter().enumerate() {
        if output.name == "stateN" || output.name == "state" {
            state_idx.get_or_insert(i);
        } else {
            prob_idx.get_or_insert(i);
        }
    }

    match (prob_idx, state_idx) {
        (Some(p), Some(s)) => Ok((p, s)),
        _ => Err(anyhow!(
            "VAD model outputs did not include both a probability and a state tensor: {:?}",
            session
                .outputs
                .iter()
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
        )),
    }
}
