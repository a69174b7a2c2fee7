//! Generator configuration

use crate::codegen::Dialect;
use crate::error::{GenError, GenResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sqlpy.toml";

/// Main generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Target dialect (postgres, mysql, sqlite)
    pub dialect: Option<String>,

    /// Directory generated modules are written to
    pub output_dir: PathBuf,

    /// Python module providing the context and error classes
    pub runtime_module: String,

    /// Stamp generated files with the generation time
    pub emit_timestamp: bool,

    /// Spaces per indentation level in generated code
    pub indent: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            output_dir: PathBuf::from("./generated"),
            runtime_module: "snapsql_runtime".to_string(),
            emit_timestamp: false,
            indent: 4,
        }
    }
}

impl GeneratorConfig {
    /// Create a new configuration builder
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    pub fn from_toml_str(content: &str) -> GenResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> GenResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load configuration.
    ///
    /// An explicit path wins; otherwise `./sqlpy.toml`, then the user config
    /// directory (`sqlpy/config.toml`), then defaults.
    pub fn load(explicit: Option<&Path>) -> GenResult<Self> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "loading config");
            return Self::from_path(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        let user = dirs::config_dir().map(|dir| dir.join("sqlpy").join("config.toml"));
        for candidate in std::iter::once(local).chain(user) {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "loading config");
                return Self::from_path(&candidate);
            }
        }

        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Resolve the target dialect.
    pub fn dialect(&self) -> GenResult<Dialect> {
        Dialect::resolve(self.dialect.as_deref())
    }

    /// Fail fast on configuration errors before any generation work.
    pub fn validate(&self) -> GenResult<Dialect> {
        let dialect = self.dialect()?;
        if self.runtime_module.trim().is_empty() {
            return Err(GenError::Config("runtime_module must not be empty".to_string()));
        }
        if self.indent == 0 {
            return Err(GenError::Config("indent must be at least 1".to_string()));
        }
        Ok(dialect)
    }
}

/// Builder for GeneratorConfig
#[derive(Debug, Default)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    /// Start from an existing configuration
    pub fn from_config(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.config.dialect = Some(dialect.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn runtime_module(mut self, module: impl Into<String>) -> Self {
        self.config.runtime_module = module.into();
        self
    }

    pub fn emit_timestamp(mut self, enabled: bool) -> Self {
        self.config.emit_timestamp = enabled;
        self
    }

    pub fn indent(mut self, spaces: usize) -> Self {
        self.config.indent = spaces;
        self
    }

    /// Build the configuration
    pub fn build(self) -> GeneratorConfig {
        self.config
    }
}
