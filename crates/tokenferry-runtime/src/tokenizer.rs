//! Tokenizer handle derived from a pipeline.

use tokenferry_core::{EngineTokenizer, Result};

/// Owns an engine tokenizer instance, independently of the pipeline that
/// produced it: the pipeline may be destroyed first.
pub struct Tokenizer {
    inner: Box<dyn EngineTokenizer>,
}

impl Tokenizer {
    pub(crate) fn new(inner: Box<dyn EngineTokenizer>) -> Self {
        Self { inner }
    }

    /// Number of tokens the engine's encode step produces for `text`.
    /// Token ids themselves are not exposed by this layer.
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.inner.encode(text)?.len())
    }
}
