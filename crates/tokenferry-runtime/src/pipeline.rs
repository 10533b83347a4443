//! Pipeline handle and generation façade.

use tracing::{debug, info};

use tokenferry_core::{
    EngineBackend, EnginePipeline, Error, GenerationConfig, RawGenerationOutput, Result, Streamer,
};

use crate::backend::installed_backend;
use crate::metrics::PerfMetrics;
use crate::streaming::{bridge_sink, TokenSink, Utf8Sink};
use crate::tokenizer::Tokenizer;

/// Result of one generate call: primary candidate text plus telemetry.
#[derive(Debug)]
pub struct GenerationResult {
    pub text: String,
    pub metrics: PerfMetrics,
}

/// Exclusive owner of one engine pipeline instance, bound at load time to a
/// model artifact and a device. Move-only; dropping it releases the engine
/// instance exactly once.
pub struct Pipeline {
    inner: Box<dyn EnginePipeline>,
    model_path: String,
    device: String,
}

impl Pipeline {
    /// Load a pipeline through an explicit backend. Slow (model loading);
    /// done once per model, not per generate call. On failure no partial
    /// handle exists.
    pub fn load(backend: &dyn EngineBackend, model_path: &str, device: &str) -> Result<Self> {
        info!(backend = backend.name(), model_path, device, "loading pipeline");
        let inner = backend.load(model_path, device)?;
        Ok(Self { inner, model_path: model_path.to_string(), device: device.to_string() })
    }

    /// Load through the process-wide installed backend.
    pub fn load_installed(model_path: &str, device: &str) -> Result<Self> {
        let backend = installed_backend().ok_or(Error::NoBackend)?;
        Self::load(backend.as_ref(), model_path, device)
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Generate and return only the primary candidate text. Zero candidates
    /// from the engine yield an empty string, not an error.
    pub fn generate(&mut self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let output = self.run(prompt, config, None)?;
        Ok(primary_text(output))
    }

    /// Same generation, additionally returning performance metrics.
    /// Metrics are present even when the text is empty.
    pub fn generate_with_metrics(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let output = self.run(prompt, config, None)?;
        Ok(into_result(output))
    }

    /// Streaming generation: the sink receives each token chunk on this
    /// thread, in order, before the final result is available. The sink
    /// returning `false` is the only cancellation mechanism.
    pub fn generate_stream(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
        sink: &mut dyn TokenSink,
    ) -> Result<GenerationResult> {
        let mut relay = bridge_sink(sink);
        let output = self.run(prompt, config, Some(&mut relay as &mut Streamer))?;
        Ok(into_result(output))
    }

    /// Streaming convenience for text consumers: chunks are UTF-8
    /// reassembled before reaching the closure.
    pub fn generate_stream_text<F>(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
        cb: F,
    ) -> Result<GenerationResult>
    where
        F: FnMut(&str) -> bool,
    {
        let mut sink = Utf8Sink::new(cb);
        self.generate_stream(prompt, config, &mut sink)
    }

    /// Enter a chat session: subsequent generates accumulate context inside
    /// the engine. Forwarded without guards; calling while already in a
    /// session is engine-defined.
    pub fn start_chat(&mut self) {
        self.inner.start_chat();
    }

    /// Leave the chat session. Forwarded without guards.
    pub fn finish_chat(&mut self) {
        self.inner.finish_chat();
    }

    /// Derive a tokenizer handle with its own independent lifetime.
    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new(self.inner.tokenizer())
    }

    fn run(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
        streamer: Option<&mut Streamer<'_>>,
    ) -> Result<RawGenerationOutput> {
        debug!(
            device = %self.device,
            prompt_len = prompt.len(),
            streaming = streamer.is_some(),
            "generate"
        );
        self.inner.generate(prompt, config, streamer)
    }
}

fn into_result(output: RawGenerationOutput) -> GenerationResult {
    let metrics = PerfMetrics::from_raw(&output.stats);
    GenerationResult { text: primary_text(output), metrics }
}

fn primary_text(mut output: RawGenerationOutput) -> String {
    if output.candidates.is_empty() {
        String::new()
    } else {
        output.candidates.swap_remove(0)
    }
}
