//! Process-wide engine backend registry.
//!
//! The handle-based surfaces (C ABI, wasm) cannot take a backend reference
//! per call, so one backend is installed for the whole process. The safe
//! Rust API also accepts an explicit backend via [`Pipeline::load`].
//!
//! [`Pipeline::load`]: crate::Pipeline::load

use std::sync::Arc;

use parking_lot::RwLock;
use tokenferry_core::EngineBackend;

static BACKEND: RwLock<Option<Arc<dyn EngineBackend>>> = RwLock::new(None);

/// Install the engine backend used by the handle-based surfaces.
/// Replaces any previously installed backend; pipelines already loaded
/// keep their original engine.
pub fn install_backend(backend: Arc<dyn EngineBackend>) {
    *BACKEND.write() = Some(backend);
}

/// Currently installed backend, if any.
pub fn installed_backend() -> Option<Arc<dyn EngineBackend>> {
    BACKEND.read().clone()
}
