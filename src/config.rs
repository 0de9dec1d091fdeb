//! Configuration loading for the strata CLI
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - `strata.toml` (or the file passed with `--config`)
//! - `STRATA_*` environment variables (a `.env` file is loaded first)
//! - command line flags, applied by the caller

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_core::{StrataError, StrataResult};
use strata_server::ServerConfig;
use strata_synth::{DEFAULT_OUTPUT_DIR, GenerationOptions};

pub const CONFIG_FILE: &str = "strata.toml";
pub const DEFAULT_DATABASE_PATH: &str = ".strata/registry.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrataConfig {
    pub database_path: PathBuf,
    pub output_dir: PathBuf,
    pub server: ServerSection,
    pub generation: GenerationSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSection {
    pub overwrite_generated: bool,
    pub include_docs: bool,
}

impl Default for StrataConfig {
    fn default() -> Self {
        StrataConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            server: ServerSection::default(),
            generation: GenerationSection::default(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        ServerSection {
            host: defaults.host,
            port: defaults.port,
        }
    }
}

impl Default for GenerationSection {
    fn default() -> Self {
        let defaults = GenerationOptions::default();
        GenerationSection {
            overwrite_generated: defaults.overwrite_generated,
            include_docs: defaults.include_docs,
        }
    }
}

impl StrataConfig {
    /// Load from `path` if given (it must exist), else from `strata.toml` in
    /// the working directory if present, then apply the process environment.
    pub fn load(path: Option<&Path>) -> StrataResult<Self> {
        let mut config = match path {
            Some(path) if !path.exists() => {
                return Err(StrataError::Config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!("Configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StrataError::io(path, e))?;
        let config = Self::from_toml(&content)
            .map_err(|e| StrataError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> StrataResult<Self> {
        toml::from_str(content).map_err(|e| StrataError::Config(format!("invalid TOML config: {e}")))
    }

    /// Override fields from `STRATA_*` variables. A variable that is set but
    /// does not parse is an error rather than silently ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> StrataResult<()> {
        if let Some(path) = lookup("STRATA_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("STRATA_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("STRATA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("STRATA_PORT") {
            self.server.port = parse_var("STRATA_PORT", &port)?;
        }
        if let Some(flag) = lookup("STRATA_OVERWRITE_GENERATED") {
            self.generation.overwrite_generated = parse_var("STRATA_OVERWRITE_GENERATED", &flag)?;
        }
        if let Some(flag) = lookup("STRATA_INCLUDE_DOCS") {
            self.generation.include_docs = parse_var("STRATA_INCLUDE_DOCS", &flag)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> StrataResult<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(StrataError::Config("database_path must not be empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(StrataError::Config("output_dir must not be empty".to_string()));
        }
        if self.server.host.trim().is_empty() {
            return Err(StrataError::Config("server.host must not be empty".to_string()));
        }
        if self.server.port == 0 {
            return Err(StrataError::Config("server.port must not be 0".to_string()));
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
        }
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            output_dir: self.output_dir.clone(),
            overwrite_generated: self.generation.overwrite_generated,
            include_docs: self.generation.include_docs,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> StrataResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| StrataError::Config(format!("{key} has invalid value {raw:?}")))
}
