//! Stub engine backend.
//!
//! Returns deterministic output to allow exercising the full bridge surface
//! without real models: whitespace tokenization, cyclic continuation when
//! sampling is disabled, seeded lexicon sampling when it is enabled. Honors
//! max-new-tokens, stop strings, chat context and streaming cancellation,
//! and measures real wall-clock telemetry.

use std::time::Instant;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::engine::{
    EngineBackend, EnginePipeline, EngineTokenizer, MeanStd, RawGenerationOutput, RawPerfStats,
    StreamControl, Streamer,
};
use crate::error::{Error, Result};

/// Devices the stub pretends to support.
const SUPPORTED_DEVICES: &[&str] = &["CPU", "GPU", "NPU"];

/// Words the sampling path draws from.
const LEXICON: &[&str] =
    &["alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel"];

/// The stub reaches its end-of-sequence after this many tokens.
const EOS_AFTER_TOKENS: usize = 16;

/// Stub engine backend
pub struct StubEngine {
    zero_candidates: bool,
}

impl StubEngine {
    pub fn new() -> Self {
        Self { zero_candidates: false }
    }

    /// Engine variant whose pipelines report zero candidates from every
    /// generate call (degenerate-output testing).
    pub fn zero_candidates() -> Self {
        Self { zero_candidates: true }
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBackend for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    fn load(&self, model_path: &str, device: &str) -> Result<Box<dyn EnginePipeline>> {
        let started = Instant::now();

        if model_path.is_empty() {
            return Err(Error::PipelineLoad("empty model path".to_string()));
        }
        if !SUPPORTED_DEVICES.contains(&device) {
            return Err(Error::DeviceUnavailable(device.to_string()));
        }

        debug!(model_path, device, "loading stub pipeline");

        Ok(Box::new(StubPipeline {
            zero_candidates: self.zero_candidates,
            load_time_ms: started.elapsed().as_secs_f32() * 1000.0,
            chat_context: None,
        }))
    }
}

#[derive(Debug)]
struct StubPipeline {
    zero_candidates: bool,
    /// Captured once at construction, reported unchanged on every call.
    load_time_ms: f32,
    /// `Some` while a chat session is active; holds accumulated tokens.
    chat_context: Option<Vec<String>>,
}

fn next_word(source: &[String], index: usize, rng: &mut Option<StdRng>) -> String {
    match rng {
        Some(rng) => LEXICON[rng.random_range(0..LEXICON.len())].to_string(),
        None if source.is_empty() => LEXICON[index % LEXICON.len()].to_string(),
        None => source[index % source.len()].clone(),
    }
}

impl EnginePipeline for StubPipeline {
    fn generate(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
        mut streamer: Option<&mut Streamer<'_>>,
    ) -> Result<RawGenerationOutput> {
        let started = Instant::now();

        if config.do_sample && config.temperature <= 0.0 {
            return Err(Error::Generation(format!(
                "temperature must be positive for sampling, got {}",
                config.temperature
            )));
        }

        let prompt_words: Vec<String> = prompt.split_whitespace().map(String::from).collect();
        let context_len = self.chat_context.as_ref().map(Vec::len).unwrap_or(0);
        let num_input_tokens = context_len + prompt_words.len();

        let mut source: Vec<String> =
            self.chat_context.clone().unwrap_or_default();
        source.extend(prompt_words.iter().cloned());

        let mut rng = if config.do_sample {
            Some(if config.rng_seed == 0 {
                StdRng::from_os_rng()
            } else {
                StdRng::seed_from_u64(config.rng_seed)
            })
        } else {
            None
        };

        let budget = config.max_new_tokens.min(EOS_AFTER_TOKENS);
        let mut text = String::new();
        let mut generated = Vec::new();
        let mut ttft_ms = 0.0f32;

        if !self.zero_candidates {
            'emit: for i in 0..budget {
                let word = next_word(&source, i, &mut rng);
                let chunk = if i == 0 { word.clone() } else { format!(" {}", word) };

                // Stop strings truncate before the match.
                for stop in &config.stop_strings {
                    if !stop.is_empty() && format!("{}{}", text, chunk).contains(stop.as_str()) {
                        break 'emit;
                    }
                }

                if i == 0 {
                    ttft_ms = started.elapsed().as_secs_f32() * 1000.0;
                }

                let status = match streamer.as_mut() {
                    Some(cb) => cb(chunk.as_bytes()),
                    None => StreamControl::Running,
                };

                text.push_str(&chunk);
                generated.push(word);

                if status == StreamControl::Stop {
                    break;
                }
            }
        }

        if let Some(context) = self.chat_context.as_mut() {
            context.extend(prompt_words);
            context.extend(generated.iter().cloned());
        }

        let duration_ms = started.elapsed().as_secs_f32() * 1000.0;
        let throughput = if duration_ms > 0.0 {
            generated.len() as f32 / (duration_ms / 1000.0)
        } else {
            0.0
        };

        debug!(
            num_input_tokens,
            num_generated_tokens = generated.len(),
            "stub generation complete"
        );

        let stats = RawPerfStats {
            load_time: self.load_time_ms,
            num_input_tokens,
            num_generated_tokens: generated.len(),
            ttft: MeanStd { mean: ttft_ms, std: 0.0 },
            throughput: MeanStd { mean: throughput, std: 0.0 },
            generate_duration: MeanStd { mean: duration_ms, std: 0.0 },
        };

        let candidates = if self.zero_candidates { Vec::new() } else { vec![text] };
        Ok(RawGenerationOutput { candidates, stats })
    }

    fn start_chat(&mut self) {
        // Restarting an active session begins a fresh one.
        self.chat_context = Some(Vec::new());
    }

    fn finish_chat(&mut self) {
        self.chat_context = None;
    }

    fn tokenizer(&self) -> Box<dyn EngineTokenizer> {
        Box::new(StubTokenizer)
    }
}

/// Whitespace tokenizer matching the stub pipeline's notion of a token.
struct StubTokenizer;

impl EngineTokenizer for StubTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.split_whitespace().enumerate().map(|(i, _)| i as u32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Box<dyn EnginePipeline> {
        StubEngine::new().load("models/tiny", "CPU").unwrap()
    }

    #[test]
    fn test_load_rejects_unknown_device() {
        let err = StubEngine::new().load("models/tiny", "TPU").unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable(_)));
    }

    #[test]
    fn test_load_rejects_empty_path() {
        let err = StubEngine::new().load("", "CPU").unwrap_err();
        assert!(matches!(err, Error::PipelineLoad(_)));
    }

    #[test]
    fn test_greedy_generation_is_deterministic() {
        let mut config = GenerationConfig::default();
        config.set_max_new_tokens(6);

        let a = pipeline().generate("one two three", &config, None).unwrap();
        let b = pipeline().generate("one two three", &config, None).unwrap();
        assert_eq!(a.candidates, b.candidates);
        assert_eq!(a.stats.num_generated_tokens, 6);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let mut config = GenerationConfig::default();
        config.set_do_sample(true);
        config.set_rng_seed(7);
        config.set_max_new_tokens(8);

        let a = pipeline().generate("hello", &config, None).unwrap();
        let b = pipeline().generate("hello", &config, None).unwrap();
        assert_eq!(a.candidates, b.candidates);
    }

    #[test]
    fn test_sampling_rejects_nonpositive_temperature() {
        let mut config = GenerationConfig::default();
        config.set_do_sample(true);
        config.set_temperature(0.0);

        let mut p = pipeline();
        let err = p.generate("hello", &config, None).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));

        // The pipeline stays usable after a per-call failure.
        config.set_temperature(0.5);
        assert!(p.generate("hello", &config, None).is_ok());
    }

    #[test]
    fn test_stop_string_truncates_before_match() {
        let mut config = GenerationConfig::default();
        config.set_stop_strings(["two"]);

        let out = pipeline().generate("one two three", &config, None).unwrap();
        let text = &out.candidates[0];
        assert!(!text.contains("two"));
        assert_eq!(text, "one");
    }

    #[test]
    fn test_streamer_stop_halts_generation() {
        let mut calls = 0;
        let mut streamer = |_chunk: &[u8]| {
            calls += 1;
            StreamControl::Stop
        };

        let config = GenerationConfig::default();
        let out = pipeline()
            .generate("one two three", &config, Some(&mut streamer as &mut Streamer))
            .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(out.stats.num_generated_tokens, 1);
    }

    #[test]
    fn test_chat_context_accumulates_and_clears() {
        let mut p = pipeline();
        let mut config = GenerationConfig::default();
        config.set_max_new_tokens(2);

        p.start_chat();
        let first = p.generate("one two", &config, None).unwrap();
        assert_eq!(first.stats.num_input_tokens, 2);

        let second = p.generate("three", &config, None).unwrap();
        // prompt + generated from the first turn are now context
        assert_eq!(second.stats.num_input_tokens, 2 + 2 + 1);

        p.finish_chat();
        let third = p.generate("three", &config, None).unwrap();
        assert_eq!(third.stats.num_input_tokens, 1);
    }

    #[test]
    fn test_zero_candidates_mode() {
        let mut p = StubEngine::zero_candidates().load("models/tiny", "CPU").unwrap();
        let config = GenerationConfig::default();

        let out = p.generate("hello", &config, None).unwrap();
        assert!(out.candidates.is_empty());
        assert_eq!(out.stats.num_generated_tokens, 0);
    }

    #[test]
    fn test_tokenizer_counts_whitespace_tokens() {
        let tokenizer = pipeline().tokenizer();
        assert_eq!(tokenizer.encode("a b c").unwrap().len(), 3);
        assert_eq!(tokenizer.encode("").unwrap().len(), 0);
    }
}
