//! Engine contract for the tokenferry bridge
//!
//! This crate defines the seam between the bridge and an opaque inference
//! engine:
//! - Error types shared across the boundary layers
//! - The engine-native generation configuration
//! - Entry-point traits the engine implements (backend, pipeline, tokenizer)
//! - Raw telemetry shapes as the engine reports them
//! - A deterministic stub backend for exercising the bridge without models

pub mod config;
pub mod engine;
pub mod error;
pub mod stub;

pub use config::GenerationConfig;
pub use engine::{
    EngineBackend, EnginePipeline, EngineTokenizer, MeanStd, RawGenerationOutput, RawPerfStats,
    StreamControl, Streamer,
};
pub use error::{Error, Result};
pub use stub::StubEngine;

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
