//! Engine entry points consumed by the bridge.
//!
//! The inference engine itself (tensor execution, device scheduling, weight
//! loading) lives behind these traits. The bridge never sees past them.

use crate::config::GenerationConfig;
use crate::error::Result;

/// Signal returned to the engine from its streaming callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    /// Keep generating.
    Running,
    /// Stop at the next engine-defined stopping point.
    Stop,
}

/// Callback shape the engine invokes once per produced token chunk,
/// synchronously on the generating thread, in generation order.
pub type Streamer<'a> = dyn FnMut(&[u8]) -> StreamControl + 'a;

/// Mean/standard-deviation pair as the engine reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanStd {
    pub mean: f32,
    pub std: f32,
}

/// Per-call measurements in the engine's own nested shape. All statistics
/// are computed by the engine; the bridge only flattens them.
#[derive(Debug, Clone, Default)]
pub struct RawPerfStats {
    /// Model load time in milliseconds, measured once at construction.
    pub load_time: f32,
    pub num_input_tokens: usize,
    pub num_generated_tokens: usize,
    /// Time to first token, milliseconds.
    pub ttft: MeanStd,
    /// Tokens per second.
    pub throughput: MeanStd,
    /// Total generation duration, milliseconds.
    pub generate_duration: MeanStd,
}

/// Everything one generate call returns from the engine. Engines may
/// produce several candidates; the bridge surfaces only the first.
#[derive(Debug, Clone, Default)]
pub struct RawGenerationOutput {
    pub candidates: Vec<String>,
    pub stats: RawPerfStats,
}

/// Factory for engine pipelines. One backend serves many pipelines.
pub trait EngineBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Construct a pipeline bound to one model artifact and one device.
    /// May be slow (model loading); called once per model, not per generate.
    fn load(&self, model_path: &str, device: &str) -> Result<Box<dyn EnginePipeline>>;
}

/// One loaded model on one device. Exclusively owned by its handle; the
/// bridge adds no locking of its own.
pub trait EnginePipeline: Send + std::fmt::Debug {
    /// Run one generation. When a streamer is attached the engine calls it
    /// exactly once per token chunk and blocks until it returns; a `Stop`
    /// result ends generation no later than the next chunk.
    fn generate(
        &mut self,
        prompt: &str,
        config: &GenerationConfig,
        streamer: Option<&mut Streamer<'_>>,
    ) -> Result<RawGenerationOutput>;

    /// Enter multi-turn mode: subsequent generates accumulate context.
    /// Redundant calls are engine-defined, not guarded here.
    fn start_chat(&mut self);

    /// Leave multi-turn mode and drop accumulated context.
    fn finish_chat(&mut self);

    /// Derive a tokenizer. The returned instance owns its own state and
    /// outlives the pipeline that produced it.
    fn tokenizer(&self) -> Box<dyn EngineTokenizer>;
}

/// Engine tokenizer entry point.
pub trait EngineTokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
}
