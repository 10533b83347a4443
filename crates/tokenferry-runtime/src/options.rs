//! Caller-side generation options record.

use tokenferry_core::GenerationConfig;

/// Flat generation options in caller-side types, safe to pass by value
/// across the C boundary. Stop strings cross separately as a pointer table
/// (see the ABI) because they are not fixed-size.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GenOptions {
    pub max_new_tokens: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub do_sample: bool,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub repetition_penalty: f32,
    pub rng_seed: u64,
    pub logprobs: u32,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: u64::MAX,
            temperature: 1.0,
            top_p: 1.0,
            top_k: 50,
            do_sample: false,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            repetition_penalty: 1.0,
            rng_seed: 0,
            logprobs: 0,
        }
    }
}

impl GenOptions {
    /// Write every scalar field into the native representation, overwriting
    /// prior values. Counts widen (u32) or saturate (u64 on 32-bit targets)
    /// into `usize`; stop strings are left untouched.
    pub fn apply_to(&self, config: &mut GenerationConfig) {
        config.max_new_tokens = usize::try_from(self.max_new_tokens).unwrap_or(usize::MAX);
        config.temperature = self.temperature;
        config.top_p = self.top_p;
        config.top_k = self.top_k as usize;
        config.do_sample = self.do_sample;
        config.frequency_penalty = self.frequency_penalty;
        config.presence_penalty = self.presence_penalty;
        config.repetition_penalty = self.repetition_penalty;
        config.rng_seed = self.rng_seed;
        config.logprobs = self.logprobs as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_writes_all_scalars() {
        let options = GenOptions {
            max_new_tokens: 64,
            temperature: 0.8,
            top_p: 0.95,
            top_k: 40,
            do_sample: true,
            frequency_penalty: 0.1,
            presence_penalty: 0.2,
            repetition_penalty: 1.1,
            rng_seed: 1234,
            logprobs: 5,
        };

        let mut config = GenerationConfig::default();
        config.set_stop_strings(["</s>"]);
        options.apply_to(&mut config);

        assert_eq!(config.max_new_tokens, 64);
        assert_eq!(config.temperature, 0.8);
        assert_eq!(config.top_p, 0.95);
        assert_eq!(config.top_k, 40);
        assert!(config.do_sample);
        assert_eq!(config.frequency_penalty, 0.1);
        assert_eq!(config.presence_penalty, 0.2);
        assert_eq!(config.repetition_penalty, 1.1);
        assert_eq!(config.rng_seed, 1234);
        assert_eq!(config.logprobs, 5);
        // stop strings do not ride in the flat record
        assert_eq!(config.stop_strings.len(), 1);
    }

    #[test]
    fn test_default_mirrors_native_defaults() {
        let mut config = GenerationConfig::default();
        let reference = config.clone();
        GenOptions::default().apply_to(&mut config);
        assert_eq!(config, reference);
    }
}
