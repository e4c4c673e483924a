//! Configuration management for the proxima query engine
//!
//! Settings are layered from:
//! - configuration files (TOML, YAML, JSON)
//! - environment variable overrides
//! - built-in defaults

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Root configuration structure for the engine
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub annotation_cache: AnnotationCacheConfig,
}

impl EngineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by PROXIMA_CONFIG env var
    /// 3. ./config/proxima.{toml,yaml,json}
    /// 4. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        builder = builder.add_source(File::with_name("./config/proxima").required(false));

        if let Ok(config_path) = std::env::var("PROXIMA_CONFIG") {
            debug!(path = %config_path, "loading engine config file");
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        // Example: PROXIMA__QUERY__MAX_LIVE_EXECUTORS=64
        builder = builder.add_source(
            Environment::with_prefix("PROXIMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path, filling gaps with defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: EngineConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("query.capture_sub_bindings", false)?
            .set_default("query.max_live_executors", DEFAULT_MAX_LIVE_EXECUTORS as u64)?
            .set_default("annotation_cache.max_entries", 1024)?
            .set_default("annotation_cache.time_to_idle_secs", 300)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.max_live_executors == 0 {
            return Err(ConfigError::Message(
                "query.max_live_executors must be > 0".to_string(),
            ));
        }

        if self.annotation_cache.max_entries == 0 {
            return Err(ConfigError::Message(
                "annotation_cache.max_entries must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default bound on materialized sub-executors per fan-out operator.
pub const DEFAULT_MAX_LIVE_EXECUTORS: usize = 4096;

/// Query execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Populate `Binding::contained` with the contributing sub-bindings
    pub capture_sub_bindings: bool,

    /// Maximum number of live child executors kept by a fan-out operator
    pub max_live_executors: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            capture_sub_bindings: false,
            max_live_executors: DEFAULT_MAX_LIVE_EXECUTORS,
        }
    }
}

/// Cache of resolved annotation term lists
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnnotationCacheConfig {
    /// Maximum number of cached resolutions
    pub max_entries: u64,

    /// Seconds an unused resolution stays cached
    pub time_to_idle_secs: u64,
}

impl Default for AnnotationCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            time_to_idle_secs: 300,
        }
    }
}

impl AnnotationCacheConfig {
    /// Convert the idle timeout to Duration
    pub fn time_to_idle(&self) -> Duration {
        Duration::from_secs(self.time_to_idle_secs)
    }
}
