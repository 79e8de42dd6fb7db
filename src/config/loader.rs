//! Configuration Loader
//!
//! Layers an optional configuration file and `CALLBACK_DISPATCH_*` environment
//! variables over [`DispatchConfig::default`] using the `config` crate.

use super::DispatchConfig;
use crate::error::ConfigurationError;
use config::{Config, Environment, File};
use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Prefix for environment overrides, e.g. `CALLBACK_DISPATCH_ISOLATE_FAULTS=false`
pub const ENV_PREFIX: &str = "CALLBACK_DISPATCH";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_VAR: &str = "CALLBACK_DISPATCH_CONFIG";

/// Default file stem looked up in the working directory (any supported extension)
pub const DEFAULT_CONFIG_STEM: &str = "config/callback_dispatch";

#[derive(Debug, Clone)]
enum FileSource {
    Default,
    Explicit(PathBuf),
    Disabled,
}

/// Builder for layered configuration loading
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: FileSource,
    read_environment: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: FileSource::Default,
            read_environment: true,
        }
    }

    /// Use an explicit file; it must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = FileSource::Explicit(path.into());
        self
    }

    /// Skip file lookup entirely
    pub fn without_file(mut self) -> Self {
        self.file = FileSource::Disabled;
        self
    }

    /// Ignore environment overrides; useful for tests that must not observe the
    /// process environment
    pub fn without_environment(mut self) -> Self {
        self.read_environment = false;
        self
    }

    pub fn load(&self) -> Result<DispatchConfig, ConfigurationError> {
        let defaults = Config::try_from(&DispatchConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        match &self.file {
            FileSource::Default => {
                let source = env::var(CONFIG_PATH_VAR)
                    .map(|path| File::from(PathBuf::from(path)).required(true))
                    .unwrap_or_else(|_| File::with_name(DEFAULT_CONFIG_STEM).required(false));
                builder = builder.add_source(source);
            }
            FileSource::Explicit(path) => {
                debug!(path = %path.display(), "Loading dispatch configuration file");
                builder = builder.add_source(File::from(path.clone()).required(true));
            }
            FileSource::Disabled => {}
        }

        if self.read_environment {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            );
        }

        let config: DispatchConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            "Dispatch configuration loaded: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(config)
    }
}
