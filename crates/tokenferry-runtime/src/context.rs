//! Handle tables and bridge-level options for the C ABI surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokenferry_core::{Error, GenerationConfig, Result};

use crate::pipeline::Pipeline;
use crate::tokenizer::Tokenizer;

/// Bridge options, parsed from JSON at init time.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Device used when a caller passes an empty device string.
    pub default_device: String,
    /// Upper bound on simultaneously loaded pipelines; 0 means unlimited.
    pub max_pipelines: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { default_device: "CPU".to_string(), max_pipelines: 0 }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Runtime(format!("Invalid config JSON: {}", e)))
    }
}

impl serde::Serialize for BridgeConfig {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BridgeConfig", 2)?;
        state.serialize_field("default_device", &self.default_device)?;
        state.serialize_field("max_pipelines", &self.max_pipelines)?;
        state.end()
    }
}

impl<'de> serde::Deserialize<'de> for BridgeConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct ConfigHelper {
            default_device: Option<String>,
            max_pipelines: Option<usize>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            default_device: helper.default_device.unwrap_or_else(|| "CPU".to_string()),
            max_pipelines: helper.max_pipelines.unwrap_or(0),
        })
    }
}

/// Process-global bridge state behind the C ABI: options plus the handle
/// tables that give opaque u32 ids to owned resources.
///
/// Pipelines sit behind per-handle mutexes so that distinct handles can be
/// driven from distinct threads while a generate call on one of them is in
/// flight. Configs are snapshotted before a generate call, which keeps them
/// immutable for the duration of that call by construction.
pub struct BridgeContext {
    pub config: BridgeConfig,
    pipelines: HashMap<u32, Arc<Mutex<Pipeline>>>,
    configs: HashMap<u32, GenerationConfig>,
    tokenizers: HashMap<u32, Arc<Tokenizer>>,
    next_id: u32,
}

impl BridgeContext {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            pipelines: HashMap::new(),
            configs: HashMap::new(),
            tokenizers: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn register_pipeline(&mut self, pipeline: Pipeline) -> Result<u32> {
        let limit = self.config.max_pipelines;
        if limit > 0 && self.pipelines.len() >= limit {
            return Err(Error::Runtime(format!("pipeline limit reached ({})", limit)));
        }
        let id = self.allocate_id();
        self.pipelines.insert(id, Arc::new(Mutex::new(pipeline)));
        Ok(id)
    }

    pub fn pipeline(&self, id: u32) -> Result<Arc<Mutex<Pipeline>>> {
        self.pipelines.get(&id).cloned().ok_or(Error::InvalidHandle(id))
    }

    pub fn remove_pipeline(&mut self, id: u32) -> Result<()> {
        self.pipelines.remove(&id).map(|_| ()).ok_or(Error::InvalidHandle(id))
    }

    pub fn register_config(&mut self) -> u32 {
        let id = self.allocate_id();
        self.configs.insert(id, GenerationConfig::default());
        id
    }

    pub fn config_mut(&mut self, id: u32) -> Result<&mut GenerationConfig> {
        self.configs.get_mut(&id).ok_or(Error::InvalidHandle(id))
    }

    /// Owned copy for use during a generate call, so setters running on
    /// other threads cannot touch the copy the call is reading.
    pub fn config_snapshot(&self, id: u32) -> Result<GenerationConfig> {
        self.configs.get(&id).cloned().ok_or(Error::InvalidHandle(id))
    }

    pub fn remove_config(&mut self, id: u32) -> Result<()> {
        self.configs.remove(&id).map(|_| ()).ok_or(Error::InvalidHandle(id))
    }

    pub fn register_tokenizer(&mut self, tokenizer: Tokenizer) -> u32 {
        let id = self.allocate_id();
        self.tokenizers.insert(id, Arc::new(tokenizer));
        id
    }

    pub fn tokenizer(&self, id: u32) -> Result<Arc<Tokenizer>> {
        self.tokenizers.get(&id).cloned().ok_or(Error::InvalidHandle(id))
    }

    pub fn remove_tokenizer(&mut self, id: u32) -> Result<()> {
        self.tokenizers.remove(&id).map(|_| ()).ok_or(Error::InvalidHandle(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenferry_core::StubEngine;

    #[test]
    fn test_config_json_defaults_missing_fields() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config.default_device, "CPU");
        assert_eq!(config.max_pipelines, 0);

        let config = BridgeConfig::from_json(r#"{"default_device": "GPU"}"#).unwrap();
        assert_eq!(config.default_device, "GPU");
    }

    #[test]
    fn test_config_json_rejects_garbage() {
        assert!(BridgeConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_handle_tables_roundtrip() {
        let mut ctx = BridgeContext::new(BridgeConfig::default());

        let pipeline = Pipeline::load(&StubEngine::new(), "models/tiny", "CPU").unwrap();
        let id = ctx.register_pipeline(pipeline).unwrap();
        assert!(ctx.pipeline(id).is_ok());
        assert!(ctx.remove_pipeline(id).is_ok());
        assert!(matches!(ctx.pipeline(id), Err(Error::InvalidHandle(_))));
        assert!(matches!(ctx.remove_pipeline(id), Err(Error::InvalidHandle(_))));
    }

    #[test]
    fn test_config_handles_are_independent() {
        let mut ctx = BridgeContext::new(BridgeConfig::default());
        let a = ctx.register_config();
        let b = ctx.register_config();
        assert_ne!(a, b);

        ctx.config_mut(a).unwrap().set_temperature(0.2);
        assert_eq!(ctx.config_snapshot(b).unwrap().temperature, 1.0);
    }

    #[test]
    fn test_pipeline_limit_enforced() {
        let config = BridgeConfig { max_pipelines: 1, ..Default::default() };
        let mut ctx = BridgeContext::new(config);

        let first = Pipeline::load(&StubEngine::new(), "models/tiny", "CPU").unwrap();
        ctx.register_pipeline(first).unwrap();

        let second = Pipeline::load(&StubEngine::new(), "models/tiny", "CPU").unwrap();
        assert!(ctx.register_pipeline(second).is_err());
    }
}
