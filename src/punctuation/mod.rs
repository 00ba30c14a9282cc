//! Punctuation restoration.
//!
//! The external-model contract is small: a pipeline takes one text fragment
//! plus an opaque cache value from the previous call, and returns punctuated
//! text plus an updated cache. The driver in this module owns everything
//! around that contract — fragment splitting, strict call ordering, cache
//! store-and-forward, and output accumulation — so it can be verified against
//! a test double without loading a model.

mod ct_transformer;

pub use ct_transformer::CtTransformer;

use crate::Result;

/// Prefix the accumulated restoration output always begins with.
pub const OUTPUT_PREFIX: &str = "outputs:";

/// The delimiter that separates fragments in a raw input document.
pub const FRAGMENT_DELIMITER: char = '|';

/// Pluggable punctuation-restoration pipeline.
///
/// A pipeline is constructed once and invoked once per fragment. Calls are
/// strictly ordered: the cache returned by call *i* is the cache passed to
/// call *i+1*, carrying cross-fragment linguistic context. Callers never
/// inspect the cache; they only store and forward it.
pub trait PunctuationPipeline {
    /// Opaque per-call context threaded between sequential calls.
    ///
    /// `Default` is the "no prior context" value used for the first fragment.
    type Cache: Default;

    /// Restore punctuation for one fragment.
    fn restore(&mut self, text_in: &str, cache: Self::Cache) -> Result<Restored<Self::Cache>>;
}

/// The result of one pipeline invocation.
pub struct Restored<C> {
    /// The fragment text with punctuation restored.
    pub text: String,

    /// Updated context to pass into the next invocation.
    pub cache: C,
}

/// Opaque cross-fragment context for [`CtTransformer`].
///
/// Internally this carries the tokens of the last unterminated sentence so the
/// model sees them again on the next call; externally it is a value to store
/// and forward, nothing more.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PunctCache {
    pub(crate) tokens: Vec<CachedToken>,
}

impl PunctCache {
    /// Whether this cache carries any prior context.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CachedToken {
    pub(crate) text: String,
    pub(crate) id: i64,
}

/// Split a raw document into its ordered fragments.
///
/// Delimiters are removed; empty fragments (from leading, trailing, or
/// consecutive delimiters) are preserved and still submitted for inference.
pub fn fragments(document: &str) -> std::str::Split<'_, char> {
    document.split(FRAGMENT_DELIMITER)
}

/// Restore punctuation across a whole delimited document.
///
/// For each fragment in original left-to-right order, the pipeline is invoked
/// with the fragment text and the cache produced by the previous invocation;
/// the returned text is appended (no separators reinserted) to an accumulator
/// initialized to [`OUTPUT_PREFIX`].
///
/// The fragment loop is intentionally sequential: each call's correctness
/// depends on the cache produced by the prior call, so fragments cannot be
/// processed in parallel. Pipeline failures propagate unchanged; there is no
/// retry and no partial-result salvage.
pub fn restore_delimited<P: PunctuationPipeline>(
    pipeline: &mut P,
    document: &str,
) -> Result<String> {
    let mut cache = P::Cache::default();
    let mut accumulated = String::from(OUTPUT_PREFIX);

    for fragment in fragments(document) {
        let restored = pipeline.restore(fragment, cache)?;
        cache = restored.cache;
        accumulated.push_str(&restored.text);
    }

    Ok(accumulated)
}
