//! tokenferry runtime with stable ABI
//!
//! The bridge proper: safe Rust handles and the generation façade, plus
//! C ABI and wasm-bindgen surfaces for host integration. The inference
//! engine is reached only through the traits in `tokenferry-core`.

mod abi;
mod backend;
mod context;
mod metrics;
mod options;
mod pipeline;
mod streaming;
mod tokenizer;
#[cfg(target_arch = "wasm32")]
mod web;

pub use abi::*;
pub use backend::{install_backend, installed_backend};
pub use context::{BridgeConfig, BridgeContext};
pub use metrics::{PerfMetrics, PerfMetricsData};
pub use options::GenOptions;
pub use pipeline::{GenerationResult, Pipeline};
pub use streaming::{TokenSink, Utf8Sink};
pub use tokenizer::Tokenizer;

pub use tokenferry_core::{Error, GenerationConfig, Result};

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error codes for C ABI
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    GenericFailure = 1,
    InvalidArgument = 2,
    PipelineLoadError = 3,
    DeviceUnavailable = 4,
    GenerationError = 5,
    TokenizerError = 6,
    NoBackend = 7,
    InvalidHandle = 8,
    BufferTooSmall = 9,
    IoError = 10,
}

impl From<&Error> for ErrorCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::PipelineLoad(_) => ErrorCode::PipelineLoadError,
            Error::DeviceUnavailable(_) => ErrorCode::DeviceUnavailable,
            Error::Generation(_) => ErrorCode::GenerationError,
            Error::Tokenizer(_) => ErrorCode::TokenizerError,
            Error::NoBackend => ErrorCode::NoBackend,
            Error::InvalidHandle(_) => ErrorCode::InvalidHandle,
            Error::Io(_) => ErrorCode::IoError,
            Error::Runtime(_) => ErrorCode::GenericFailure,
        }
    }
}

/// Thread-local error message storage for C ABI
use std::cell::RefCell;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

pub(crate) fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}
