/// C ABI exports for the tokenferry bridge
///
/// Provides a stable FFI interface for host languages. All strings cross as
/// pointer+length UTF-8 views; generated text is copied into caller-owned
/// buffers. Errors surface as codes plus a thread-local message readable via
/// `tokenferry_last_error`.
use std::collections::BTreeSet;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::slice;
use std::sync::{Arc, Mutex};

use tokenferry_core::{Error, GenerationConfig};

use crate::backend::installed_backend;
use crate::context::{BridgeConfig, BridgeContext};
use crate::metrics::PerfMetricsData;
use crate::options::GenOptions;
use crate::pipeline::Pipeline;
use crate::streaming::TokenSink;
use crate::{set_last_error, take_last_error, ErrorCode};

// Global bridge context (protected by mutex; per-pipeline locks live inside)
static CONTEXT: Mutex<Option<BridgeContext>> = Mutex::new(None);

/// Token callback invoked once per generated chunk, synchronously on the
/// calling thread; return false to stop generation.
pub type TokenCallback =
    unsafe extern "C" fn(chunk_ptr: *const u8, chunk_len: usize, user_data: *mut c_void) -> bool;

struct CallbackSink {
    cb: TokenCallback,
    user_data: *mut c_void,
}

impl TokenSink for CallbackSink {
    fn on_token(&mut self, chunk: &[u8]) -> bool {
        unsafe { (self.cb)(chunk.as_ptr(), chunk.len(), self.user_data) }
    }
}

fn with_context<T>(f: impl FnOnce(&mut BridgeContext) -> Result<T, Error>) -> Result<T, Error> {
    let mut guard = CONTEXT.lock().unwrap();
    match guard.as_mut() {
        Some(ctx) => f(ctx),
        None => Err(Error::Runtime("bridge not initialized".to_string())),
    }
}

fn report(e: Error) -> ErrorCode {
    let code = ErrorCode::from(&e);
    set_last_error(e.to_string());
    code
}

fn neg(code: ErrorCode) -> i64 {
    -(code as i64)
}

fn neg_report(e: Error) -> i64 {
    neg(report(e))
}

/// # Safety
/// `ptr` must be valid for reads of `len` bytes unless `len` is 0.
unsafe fn str_arg<'a>(ptr: *const u8, len: usize, what: &str) -> Option<&'a str> {
    if len == 0 {
        return Some("");
    }
    if ptr.is_null() {
        set_last_error(format!("Invalid {} pointer", what));
        return None;
    }
    let bytes = slice::from_raw_parts(ptr, len);
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s),
        Err(e) => {
            set_last_error(format!("Invalid UTF-8 in {}: {}", what, e));
            None
        }
    }
}

/// # Safety
/// `out_ptr` must be valid for writes of `out_cap` bytes.
unsafe fn write_text(text: &str, out_ptr: *mut u8, out_cap: usize) -> i64 {
    if out_ptr.is_null() {
        set_last_error("Invalid output buffer pointer".to_string());
        return neg(ErrorCode::InvalidArgument);
    }
    if text.len() > out_cap {
        set_last_error(format!(
            "Output buffer too small: need {} bytes, have {}",
            text.len(),
            out_cap
        ));
        return neg(ErrorCode::BufferTooSmall);
    }
    ptr::copy_nonoverlapping(text.as_ptr(), out_ptr, text.len());
    text.len() as i64
}

fn config_op(handle: u32, f: impl FnOnce(&mut GenerationConfig)) -> u32 {
    match with_context(|ctx| ctx.config_mut(handle).map(f)) {
        Ok(_) => ErrorCode::Ok as u32,
        Err(e) => report(e) as u32,
    }
}

fn pipeline_op(handle: u32, f: impl FnOnce(&mut Pipeline)) -> u32 {
    let pipeline = match with_context(|ctx| ctx.pipeline(handle)) {
        Ok(p) => p,
        Err(e) => return report(e) as u32,
    };
    f(&mut pipeline.lock().unwrap());
    ErrorCode::Ok as u32
}

/// Fetch the handles a generate call needs, releasing the global lock
/// before the (potentially long) generation itself runs.
fn generate_args(
    pipeline: u32,
    config: u32,
) -> Result<(Arc<Mutex<Pipeline>>, GenerationConfig), Error> {
    with_context(|ctx| Ok((ctx.pipeline(pipeline)?, ctx.config_snapshot(config)?)))
}

/// Initialize the bridge with JSON options (null/empty means defaults).
///
/// Returns 0 on success, error code otherwise. Calling again updates the
/// options and keeps live handles.
///
/// # Safety
/// `config_ptr` must be valid for reads of `config_len` bytes, or null.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_init(config_ptr: *const u8, config_len: usize) -> u32 {
    let config_str = if config_ptr.is_null() || config_len == 0 {
        "{}"
    } else {
        match str_arg(config_ptr, config_len, "config") {
            Some(s) => s,
            None => return ErrorCode::InvalidArgument as u32,
        }
    };

    let config = match BridgeConfig::from_json(config_str) {
        Ok(c) => c,
        Err(e) => return report(e) as u32,
    };

    let mut guard = CONTEXT.lock().unwrap();
    match guard.as_mut() {
        Some(ctx) => ctx.config = config,
        None => *guard = Some(BridgeContext::new(config)),
    }

    ErrorCode::Ok as u32
}

/// Create a pipeline through the installed engine backend.
///
/// Returns pipeline handle (>0) on success, 0 on error. An empty device
/// string selects the configured default device. Loading may be slow.
///
/// # Safety
/// `path_ptr` must be valid for reads of `path_len` bytes; `device_ptr`
/// for `device_len` bytes (either may be null when its length is 0).
#[no_mangle]
pub unsafe extern "C" fn tokenferry_create_pipeline(
    path_ptr: *const u8,
    path_len: usize,
    device_ptr: *const u8,
    device_len: usize,
) -> u32 {
    let model_path = match str_arg(path_ptr, path_len, "model path") {
        Some(s) => s,
        None => return 0,
    };
    let device = match str_arg(device_ptr, device_len, "device") {
        Some(s) => s,
        None => return 0,
    };

    let backend = match installed_backend() {
        Some(b) => b,
        None => {
            report(Error::NoBackend);
            return 0;
        }
    };

    let device = if device.is_empty() {
        match with_context(|ctx| Ok(ctx.config.default_device.clone())) {
            Ok(d) => d,
            Err(e) => {
                report(e);
                return 0;
            }
        }
    } else {
        device.to_string()
    };

    // Load without holding the global lock; register afterwards.
    match Pipeline::load(backend.as_ref(), model_path, &device) {
        Ok(pipeline) => match with_context(|ctx| ctx.register_pipeline(pipeline)) {
            Ok(handle) => handle,
            Err(e) => {
                report(e);
                0
            }
        },
        Err(e) => {
            report(e);
            0
        }
    }
}

/// Destroy a pipeline and release its engine resources.
#[no_mangle]
pub extern "C" fn tokenferry_free_pipeline(pipeline: u32) -> u32 {
    match with_context(|ctx| ctx.remove_pipeline(pipeline)) {
        Ok(_) => ErrorCode::Ok as u32,
        Err(e) => report(e) as u32,
    }
}

/// Create a generation config with engine-defined defaults.
///
/// Returns config handle (>0), or 0 if the bridge is not initialized.
#[no_mangle]
pub extern "C" fn tokenferry_create_config() -> u32 {
    match with_context(|ctx| Ok(ctx.register_config())) {
        Ok(handle) => handle,
        Err(e) => {
            report(e);
            0
        }
    }
}

/// Destroy a generation config.
#[no_mangle]
pub extern "C" fn tokenferry_free_config(config: u32) -> u32 {
    match with_context(|ctx| ctx.remove_config(config)) {
        Ok(_) => ErrorCode::Ok as u32,
        Err(e) => report(e) as u32,
    }
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_max_new_tokens(config: u32, max_new_tokens: u64) -> u32 {
    config_op(config, |c| {
        c.set_max_new_tokens(usize::try_from(max_new_tokens).unwrap_or(usize::MAX))
    })
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_temperature(config: u32, temperature: f32) -> u32 {
    config_op(config, |c| c.set_temperature(temperature))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_top_p(config: u32, top_p: f32) -> u32 {
    config_op(config, |c| c.set_top_p(top_p))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_top_k(config: u32, top_k: u64) -> u32 {
    config_op(config, |c| c.set_top_k(usize::try_from(top_k).unwrap_or(usize::MAX)))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_do_sample(config: u32, do_sample: bool) -> u32 {
    config_op(config, |c| c.set_do_sample(do_sample))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_frequency_penalty(
    config: u32,
    frequency_penalty: f32,
) -> u32 {
    config_op(config, |c| c.set_frequency_penalty(frequency_penalty))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_presence_penalty(
    config: u32,
    presence_penalty: f32,
) -> u32 {
    config_op(config, |c| c.set_presence_penalty(presence_penalty))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_repetition_penalty(
    config: u32,
    repetition_penalty: f32,
) -> u32 {
    config_op(config, |c| c.set_repetition_penalty(repetition_penalty))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_rng_seed(config: u32, rng_seed: u64) -> u32 {
    config_op(config, |c| c.set_rng_seed(rng_seed))
}

#[no_mangle]
pub extern "C" fn tokenferry_config_set_logprobs(config: u32, logprobs: u64) -> u32 {
    config_op(config, |c| c.set_logprobs(usize::try_from(logprobs).unwrap_or(usize::MAX)))
}

/// Replace the stop-string set. Duplicate inputs collapse silently.
///
/// # Safety
/// `ptrs` and `lens` must each be valid for reads of `count` elements, and
/// every `ptrs[i]` valid for reads of `lens[i]` bytes.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_config_set_stop_strings(
    config: u32,
    ptrs: *const *const u8,
    lens: *const usize,
    count: usize,
) -> u32 {
    if count > 0 && (ptrs.is_null() || lens.is_null()) {
        set_last_error("Invalid stop string table pointer".to_string());
        return ErrorCode::InvalidArgument as u32;
    }

    let mut stops = BTreeSet::new();
    for i in 0..count {
        let s = match str_arg(*ptrs.add(i), *lens.add(i), "stop string") {
            Some(s) => s,
            None => return ErrorCode::InvalidArgument as u32,
        };
        stops.insert(s.to_string());
    }

    config_op(config, |c| c.set_stop_strings(stops))
}

/// Apply a flat options record in one call (stop strings unaffected).
///
/// # Safety
/// `options` must point to a valid `GenOptions` record.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_config_apply(
    config: u32,
    options: *const GenOptions,
) -> u32 {
    if options.is_null() {
        set_last_error("Invalid options pointer".to_string());
        return ErrorCode::InvalidArgument as u32;
    }
    let options = *options;
    config_op(config, |c| options.apply_to(c))
}

/// Generate text, writing the primary candidate into `out_ptr`.
///
/// Returns the number of bytes written, or a negative error code. Zero
/// candidates from the engine write nothing and return 0.
///
/// # Safety
/// `prompt_ptr` must be valid for reads of `prompt_len` bytes; `out_ptr`
/// for writes of `out_cap` bytes.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_generate(
    pipeline: u32,
    prompt_ptr: *const u8,
    prompt_len: usize,
    config: u32,
    out_ptr: *mut u8,
    out_cap: usize,
) -> i64 {
    let prompt = match str_arg(prompt_ptr, prompt_len, "prompt") {
        Some(s) => s,
        None => return neg(ErrorCode::InvalidArgument),
    };
    let (pipeline, config) = match generate_args(pipeline, config) {
        Ok(v) => v,
        Err(e) => return neg_report(e),
    };

    let mut guard = pipeline.lock().unwrap();
    match guard.generate(prompt, &config) {
        Ok(text) => write_text(&text, out_ptr, out_cap),
        Err(e) => neg_report(e),
    }
}

/// Generate text and fill `metrics_ptr` with the flat telemetry record.
///
/// # Safety
/// Pointer contracts of `tokenferry_generate`, plus `metrics_ptr` must be
/// valid for one `PerfMetricsData` write.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_generate_with_metrics(
    pipeline: u32,
    prompt_ptr: *const u8,
    prompt_len: usize,
    config: u32,
    out_ptr: *mut u8,
    out_cap: usize,
    metrics_ptr: *mut PerfMetricsData,
) -> i64 {
    if metrics_ptr.is_null() {
        set_last_error("Invalid metrics pointer".to_string());
        return neg(ErrorCode::InvalidArgument);
    }
    let prompt = match str_arg(prompt_ptr, prompt_len, "prompt") {
        Some(s) => s,
        None => return neg(ErrorCode::InvalidArgument),
    };
    let (pipeline, config) = match generate_args(pipeline, config) {
        Ok(v) => v,
        Err(e) => return neg_report(e),
    };

    let mut guard = pipeline.lock().unwrap();
    match guard.generate_with_metrics(prompt, &config) {
        Ok(result) => {
            *metrics_ptr = result.metrics.data();
            write_text(&result.text, out_ptr, out_cap)
        }
        Err(e) => neg_report(e),
    }
}

/// Streaming generation: `cb` receives each token chunk synchronously, in
/// order, before this call returns; a false return stops generation. The
/// final text and metrics are delivered exactly as in
/// `tokenferry_generate_with_metrics`.
///
/// # Safety
/// Pointer contracts of `tokenferry_generate_with_metrics`; `cb` must be a
/// valid function pointer for the duration of the call and `user_data` is
/// passed through to it untouched.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_generate_stream(
    pipeline: u32,
    prompt_ptr: *const u8,
    prompt_len: usize,
    config: u32,
    cb: Option<TokenCallback>,
    user_data: *mut c_void,
    out_ptr: *mut u8,
    out_cap: usize,
    metrics_ptr: *mut PerfMetricsData,
) -> i64 {
    let cb = match cb {
        Some(cb) => cb,
        None => {
            set_last_error("Invalid token callback pointer".to_string());
            return neg(ErrorCode::InvalidArgument);
        }
    };
    if metrics_ptr.is_null() {
        set_last_error("Invalid metrics pointer".to_string());
        return neg(ErrorCode::InvalidArgument);
    }
    let prompt = match str_arg(prompt_ptr, prompt_len, "prompt") {
        Some(s) => s,
        None => return neg(ErrorCode::InvalidArgument),
    };
    let (pipeline, config) = match generate_args(pipeline, config) {
        Ok(v) => v,
        Err(e) => return neg_report(e),
    };

    let mut sink = CallbackSink { cb, user_data };
    let mut guard = pipeline.lock().unwrap();
    match guard.generate_stream(prompt, &config, &mut sink) {
        Ok(result) => {
            *metrics_ptr = result.metrics.data();
            write_text(&result.text, out_ptr, out_cap)
        }
        Err(e) => neg_report(e),
    }
}

/// Enter a chat session on the pipeline. Forwarded without guards.
#[no_mangle]
pub extern "C" fn tokenferry_start_chat(pipeline: u32) -> u32 {
    pipeline_op(pipeline, |p| p.start_chat())
}

/// Leave the chat session. Forwarded without guards.
#[no_mangle]
pub extern "C" fn tokenferry_finish_chat(pipeline: u32) -> u32 {
    pipeline_op(pipeline, |p| p.finish_chat())
}

/// Derive a tokenizer from a pipeline.
///
/// Returns tokenizer handle (>0) on success, 0 on error. The tokenizer
/// outlives the pipeline it came from.
#[no_mangle]
pub extern "C" fn tokenferry_get_tokenizer(pipeline: u32) -> u32 {
    let pipeline = match with_context(|ctx| ctx.pipeline(pipeline)) {
        Ok(p) => p,
        Err(e) => {
            report(e);
            return 0;
        }
    };

    let tokenizer = pipeline.lock().unwrap().tokenizer();
    match with_context(|ctx| Ok(ctx.register_tokenizer(tokenizer))) {
        Ok(handle) => handle,
        Err(e) => {
            report(e);
            0
        }
    }
}

/// Destroy a tokenizer handle.
#[no_mangle]
pub extern "C" fn tokenferry_free_tokenizer(tokenizer: u32) -> u32 {
    match with_context(|ctx| ctx.remove_tokenizer(tokenizer)) {
        Ok(_) => ErrorCode::Ok as u32,
        Err(e) => report(e) as u32,
    }
}

/// Count the tokens the engine's encode step produces for `text`.
///
/// Returns the count, or a negative error code.
///
/// # Safety
/// `text_ptr` must be valid for reads of `text_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_count_tokens(
    tokenizer: u32,
    text_ptr: *const u8,
    text_len: usize,
) -> i64 {
    let text = match str_arg(text_ptr, text_len, "text") {
        Some(s) => s,
        None => return neg(ErrorCode::InvalidArgument),
    };
    let tokenizer = match with_context(|ctx| ctx.tokenizer(tokenizer)) {
        Ok(t) => t,
        Err(e) => return neg_report(e),
    };
    match tokenizer.count_tokens(text) {
        Ok(count) => count as i64,
        Err(e) => neg_report(e),
    }
}

/// Get last error message
///
/// Returns number of bytes written to buffer.
///
/// # Safety
/// `buf_ptr` must be valid for writes of `buf_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn tokenferry_last_error(buf_ptr: *mut c_char, buf_len: usize) -> usize {
    if buf_ptr.is_null() || buf_len == 0 {
        return 0;
    }

    let error_msg = take_last_error().unwrap_or_else(|| "No error".to_string());
    let bytes = error_msg.as_bytes();
    let copy_len = bytes.len().min(buf_len - 1); // Leave room for null terminator

    ptr::copy_nonoverlapping(bytes.as_ptr(), buf_ptr as *mut u8, copy_len);
    *buf_ptr.add(copy_len) = 0; // Null terminator

    copy_len
}

/// Get bridge version string
#[no_mangle]
pub extern "C" fn tokenferry_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_init() {
        let config = b"{}";
        let result = unsafe { tokenferry_init(config.as_ptr(), config.len()) };
        assert_eq!(result, ErrorCode::Ok as u32);
    }

    #[test]
    fn test_init_rejects_bad_json() {
        let config = b"not json";
        let result = unsafe { tokenferry_init(config.as_ptr(), config.len()) };
        assert_eq!(result, ErrorCode::GenericFailure as u32);
    }

    #[test]
    fn test_version() {
        let ver_ptr = tokenferry_version();
        assert!(!ver_ptr.is_null());

        let c_str = unsafe { CStr::from_ptr(ver_ptr) };
        let version = c_str.to_str().unwrap();
        assert!(!version.is_empty());
    }
}
