//! Engine-native generation configuration.

use std::collections::BTreeSet;

/// Generation parameters in the engine's native representation.
///
/// Defaults are the engine's own: greedy decoding, no length limit beyond
/// the engine's, no stop strings. A config is a plain value object — it may
/// be reused across any number of generate calls against the same or
/// different pipelines, but must not be mutated while a call is reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: usize,
    pub do_sample: bool,
    /// Order-irrelevant, no duplicates.
    pub stop_strings: BTreeSet<String>,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub repetition_penalty: f32,
    /// 0 means the engine chooses its own seed.
    pub rng_seed: u64,
    /// 0 disables logprob reporting.
    pub logprobs: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: usize::MAX,
            temperature: 1.0,
            top_p: 1.0,
            top_k: 50,
            do_sample: false,
            stop_strings: BTreeSet::new(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            repetition_penalty: 1.0,
            rng_seed: 0,
            logprobs: 0,
        }
    }
}

/// Setters overwrite the prior value and perform no validation: out-of-range
/// values are forwarded unchecked, the engine is the validation authority at
/// generate time.
impl GenerationConfig {
    pub fn set_max_new_tokens(&mut self, max_new_tokens: usize) {
        self.max_new_tokens = max_new_tokens;
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    pub fn set_top_p(&mut self, top_p: f32) {
        self.top_p = top_p;
    }

    pub fn set_top_k(&mut self, top_k: usize) {
        self.top_k = top_k;
    }

    pub fn set_do_sample(&mut self, do_sample: bool) {
        self.do_sample = do_sample;
    }

    /// Replaces the entire stop-set; duplicate inputs collapse silently.
    pub fn set_stop_strings<I, S>(&mut self, stop_strings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_strings = stop_strings.into_iter().map(Into::into).collect();
    }

    pub fn set_frequency_penalty(&mut self, frequency_penalty: f32) {
        self.frequency_penalty = frequency_penalty;
    }

    pub fn set_presence_penalty(&mut self, presence_penalty: f32) {
        self.presence_penalty = presence_penalty;
    }

    pub fn set_repetition_penalty(&mut self, repetition_penalty: f32) {
        self.repetition_penalty = repetition_penalty;
    }

    pub fn set_rng_seed(&mut self, rng_seed: u64) {
        self.rng_seed = rng_seed;
    }

    pub fn set_logprobs(&mut self, logprobs: usize) {
        self.logprobs = logprobs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_greedy() {
        let config = GenerationConfig::default();
        assert!(!config.do_sample);
        assert!(config.stop_strings.is_empty());
        assert_eq!(config.rng_seed, 0);
        assert_eq!(config.logprobs, 0);
    }

    #[test]
    fn test_stop_strings_collapse_duplicates() {
        let mut config = GenerationConfig::default();
        config.set_stop_strings(["a", "a", "b"]);
        assert_eq!(config.stop_strings.len(), 2);
        assert!(config.stop_strings.contains("a"));
        assert!(config.stop_strings.contains("b"));
    }

    #[test]
    fn test_stop_strings_replace_not_merge() {
        let mut config = GenerationConfig::default();
        config.set_stop_strings(["a", "b"]);
        config.set_stop_strings(["c"]);
        assert_eq!(config.stop_strings.len(), 1);
        assert!(config.stop_strings.contains("c"));
    }

    #[test]
    fn test_setters_overwrite_unchecked() {
        let mut config = GenerationConfig::default();
        config.set_top_p(1.5); // out of range, forwarded as-is
        config.set_top_p(0.3);
        assert_eq!(config.top_p, 0.3);
    }
}
