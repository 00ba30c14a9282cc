use diction::punctuation::{
    OUTPUT_PREFIX, PunctuationPipeline, Restored, fragments, restore_delimited,
};

/// Test double that records every invocation and returns a deterministic
/// transformation, so driver-contract properties can be asserted without a
/// model.
#[derive(Default)]
struct RecordingPipeline {
    /// `(text_in, cache)` for each invocation, in call order.
    calls: Vec<(String, u64)>,

    /// When set, fail on the fragment with this exact text.
    fail_on: Option<String>,
}

impl PunctuationPipeline for RecordingPipeline {
    type Cache = u64;

    fn restore(&mut self, text_in: &str, cache: u64) -> diction::Result<Restored<u64>> {
        self.calls.push((text_in.to_owned(), cache));

        if self.fail_on.as_deref() == Some(text_in) {
            return Err(diction::Error::Message("stub inference failure".into()));
        }

        Ok(Restored {
            text: format!("[{text_in}]"),
            cache: cache + 1,
        })
    }
}

#[test]
fn splits_on_delimiter_and_invokes_once_per_fragment() -> anyhow::Result<()> {
    let mut stub = RecordingPipeline::default();
    let out = restore_delimited(&mut stub, "A|B|C")?;

    let texts: Vec<&str> = stub.calls.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(texts, vec!["A", "B", "C"]);
    assert_eq!(out, "outputs:[A][B][C]");
    Ok(())
}

#[test]
fn output_always_begins_with_the_literal_prefix() -> anyhow::Result<()> {
    let mut stub = RecordingPipeline::default();
    let out = restore_delimited(&mut stub, "hello")?;
    assert!(out.starts_with(OUTPUT_PREFIX));

    // Even an empty document yields the prefix (plus one empty-fragment call).
    let mut stub = RecordingPipeline::default();
    let out = restore_delimited(&mut stub, "")?;
    assert!(out.starts_with(OUTPUT_PREFIX));
    assert_eq!(stub.calls.len(), 1);
    Ok(())
}

#[test]
fn cache_returned_by_each_call_is_passed_to_the_next() -> anyhow::Result<()> {
    let mut stub = RecordingPipeline::default();
    restore_delimited(&mut stub, "a|b|c|d")?;

    // The stub returns `cache + 1`, starting from the default of 0: the cache
    // observed by invocation i must therefore be exactly i.
    for (i, (_, cache)) in stub.calls.iter().enumerate() {
        assert_eq!(*cache, i as u64, "cache chain broken at invocation {i}");
    }
    Ok(())
}

#[test]
fn invocations_occur_in_left_to_right_fragment_order() -> anyhow::Result<()> {
    let mut stub = RecordingPipeline::default();
    let document = "first|second|third";
    restore_delimited(&mut stub, document)?;

    let expected: Vec<String> = fragments(document).map(str::to_owned).collect();
    let got: Vec<String> = stub.calls.iter().map(|(t, _)| t.clone()).collect();
    assert_eq!(got, expected);
    Ok(())
}

#[test]
fn empty_fragments_are_preserved_and_submitted() -> anyhow::Result<()> {
    let mut stub = RecordingPipeline::default();
    restore_delimited(&mut stub, "|A||B|")?;

    let texts: Vec<&str> = stub.calls.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(texts, vec!["", "A", "", "B", ""]);
    Ok(())
}

#[test]
fn a_document_without_delimiters_is_a_single_fragment() -> anyhow::Result<()> {
    let mut stub = RecordingPipeline::default();
    let out = restore_delimited(&mut stub, "no delimiter here")?;

    assert_eq!(stub.calls.len(), 1);
    assert_eq!(stub.calls[0].0, "no delimiter here");
    assert_eq!(out, "outputs:[no delimiter here]");
    Ok(())
}

#[test]
fn pipeline_failures_propagate_and_stop_the_loop() {
    let mut stub = RecordingPipeline {
        fail_on: Some("B".to_owned()),
        ..Default::default()
    };

    let err = restore_delimited(&mut stub, "A|B|C").unwrap_err();
    assert!(err.to_string().contains("stub inference failure"));

    // No retry and no further fragments after the failing one.
    let texts: Vec<&str> = stub.calls.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(texts, vec!["A", "B"]);
}

#[test]
fn rerunning_with_a_fixed_stub_is_idempotent() -> anyhow::Result<()> {
    let document = "一|二|三";

    let mut first = RecordingPipeline::default();
    let mut second = RecordingPipeline::default();
    let a = restore_delimited(&mut first, document)?;
    let b = restore_delimited(&mut second, document)?;

    assert_eq!(a, b);
    assert_eq!(first.calls, second.calls);
    Ok(())
}

#[test]
fn construction_fails_fast_without_model_files() -> anyhow::Result<()> {
    use diction::pipeline::{PipelineConfig, punctuation_pipeline};
    use diction::task::Task;

    // Unknown model name.
    let cfg = PipelineConfig::new(Task::Punctuation, "no-such-model");
    let err = punctuation_pipeline(&cfg).unwrap_err();
    assert!(err.to_string().contains("unknown model"));

    // Existing directory, but no model artifact inside.
    let dir = tempfile::tempdir()?;
    let cfg = PipelineConfig::new(
        Task::Punctuation,
        dir.path().to_string_lossy().into_owned(),
    );
    let err = punctuation_pipeline(&cfg).unwrap_err();
    assert!(err.to_string().contains("punctuation model file not found"));
    Ok(())
}
