//! WebAssembly bindings for browser hosts
#![cfg(target_arch = "wasm32")]

use wasm_bindgen::prelude::*;

use tokenferry_core::GenerationConfig;

use crate::metrics::PerfMetrics;
use crate::pipeline::Pipeline;
use crate::streaming::Utf8Sink;

/// JavaScript-compatible pipeline wrapper. Owns its pipeline and a
/// generation config mutated through the setters below.
#[wasm_bindgen]
pub struct WasmPipeline {
    pipeline: Pipeline,
    config: GenerationConfig,
}

#[wasm_bindgen]
impl WasmPipeline {
    /// Load a pipeline through the installed engine backend.
    #[wasm_bindgen(constructor)]
    pub fn new(model_path: &str, device: &str) -> Result<WasmPipeline, JsValue> {
        let pipeline = Pipeline::load_installed(model_path, device)
            .map_err(|e| JsValue::from_str(&format!("Failed to load pipeline: {}", e)))?;

        Ok(WasmPipeline { pipeline, config: GenerationConfig::default() })
    }

    pub fn set_max_new_tokens(&mut self, max_new_tokens: u32) {
        self.config.set_max_new_tokens(max_new_tokens as usize);
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.config.set_temperature(temperature);
    }

    pub fn set_top_p(&mut self, top_p: f32) {
        self.config.set_top_p(top_p);
    }

    pub fn set_top_k(&mut self, top_k: u32) {
        self.config.set_top_k(top_k as usize);
    }

    pub fn set_do_sample(&mut self, do_sample: bool) {
        self.config.set_do_sample(do_sample);
    }

    /// Replaces the stop-string set; duplicates collapse silently.
    pub fn set_stop_strings(&mut self, stop_strings: Vec<String>) {
        self.config.set_stop_strings(stop_strings);
    }

    pub fn set_frequency_penalty(&mut self, frequency_penalty: f32) {
        self.config.set_frequency_penalty(frequency_penalty);
    }

    pub fn set_presence_penalty(&mut self, presence_penalty: f32) {
        self.config.set_presence_penalty(presence_penalty);
    }

    pub fn set_repetition_penalty(&mut self, repetition_penalty: f32) {
        self.config.set_repetition_penalty(repetition_penalty);
    }

    pub fn set_rng_seed(&mut self, rng_seed: u64) {
        self.config.set_rng_seed(rng_seed);
    }

    pub fn set_logprobs(&mut self, logprobs: u32) {
        self.config.set_logprobs(logprobs as usize);
    }

    /// Generate text (blocking)
    pub fn generate(&mut self, prompt: &str) -> Result<String, JsValue> {
        self.pipeline
            .generate(prompt, &self.config)
            .map_err(|e| JsValue::from_str(&format!("Generation failed: {}", e)))
    }

    /// Generate and return `{text, metrics}` where metrics carries the flat
    /// telemetry record field by field.
    pub fn generate_with_metrics(&mut self, prompt: &str) -> Result<JsValue, JsValue> {
        let result = self
            .pipeline
            .generate_with_metrics(prompt, &self.config)
            .map_err(|e| JsValue::from_str(&format!("Generation failed: {}", e)))?;

        let obj = js_sys::Object::new();
        js_sys::Reflect::set(&obj, &"text".into(), &result.text.into())?;
        js_sys::Reflect::set(&obj, &"metrics".into(), &metrics_object(&result.metrics)?)?;
        Ok(obj.into())
    }

    /// Generate with streaming callback
    /// callback: function(chunk_text: string) -> boolean (continue?)
    pub fn generate_stream(
        &mut self,
        prompt: &str,
        callback: &js_sys::Function,
    ) -> Result<String, JsValue> {
        let this = JsValue::null();

        let mut sink = Utf8Sink::new(|chunk: &str| {
            let chunk_js = JsValue::from_str(chunk);
            if let Ok(result) = callback.call1(&this, &chunk_js) {
                result.as_bool().unwrap_or(true)
            } else {
                false
            }
        });

        let result = self
            .pipeline
            .generate_stream(prompt, &self.config, &mut sink)
            .map_err(|e| JsValue::from_str(&format!("Streaming generation failed: {}", e)))?;

        Ok(result.text)
    }

    pub fn start_chat(&mut self) {
        self.pipeline.start_chat();
    }

    pub fn finish_chat(&mut self) {
        self.pipeline.finish_chat();
    }

    /// Token count for `text` using the pipeline's tokenizer.
    pub fn count_tokens(&self, text: &str) -> Result<u32, JsValue> {
        self.pipeline
            .tokenizer()
            .count_tokens(text)
            .map(|n| n as u32)
            .map_err(|e| JsValue::from_str(&format!("Tokenizer failed: {}", e)))
    }
}

fn metrics_object(metrics: &PerfMetrics) -> Result<JsValue, JsValue> {
    let data = metrics.data();
    let obj = js_sys::Object::new();
    js_sys::Reflect::set(&obj, &"load_time".into(), &data.load_time.into())?;
    js_sys::Reflect::set(
        &obj,
        &"num_input_tokens".into(),
        &(data.num_input_tokens as f64).into(),
    )?;
    js_sys::Reflect::set(
        &obj,
        &"num_generated_tokens".into(),
        &(data.num_generated_tokens as f64).into(),
    )?;
    js_sys::Reflect::set(&obj, &"ttft_mean".into(), &data.ttft_mean.into())?;
    js_sys::Reflect::set(&obj, &"ttft_std".into(), &data.ttft_std.into())?;
    js_sys::Reflect::set(&obj, &"throughput_mean".into(), &data.throughput_mean.into())?;
    js_sys::Reflect::set(&obj, &"throughput_std".into(), &data.throughput_std.into())?;
    js_sys::Reflect::set(
        &obj,
        &"generate_duration_mean".into(),
        &data.generate_duration_mean.into(),
    )?;
    js_sys::Reflect::set(
        &obj,
        &"generate_duration_std".into(),
        &data.generate_duration_std.into(),
    )?;
    Ok(obj.into())
}

/// Get library version
#[wasm_bindgen]
pub fn version() -> String {
    crate::VERSION.to_string()
}
