use thiserror::Error;

/// Core error types for tokenferry
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to load pipeline: {0}")]
    PipelineLoad(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("No engine backend installed")]
    NoBackend,

    #[error("Invalid handle: {0}")]
    InvalidHandle(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
