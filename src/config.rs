use crate::format::{CommandFormatter, Formatter, IdentityFormatter};
use crate::store::VersionStore;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml_edit::de::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

/// Tool configuration, loaded from a TOML file or defaulted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub formatter: FormatterConfig,
    /// Central backup root override. Defaults to `~/.snippatch-backups`.
    pub backup_root: Option<PathBuf>,
    /// File name suffix selected by the scan.
    pub file_suffix: String,
    /// Context lines in diff summaries.
    pub diff_context: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatterConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// When false the formatter step passes text through unchanged.
    pub enabled: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            formatter: FormatterConfig::default(),
            backup_root: None,
            file_suffix: ".py".to_string(),
            diff_context: 1,
        }
    }
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            program: "ruff".to_string(),
            args: vec!["format".to_string(), "-".to_string()],
            timeout_secs: 10,
            enabled: true,
        }
    }
}

impl ToolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_suffix.is_empty() {
            return Err(ConfigError::Validation(
                "file_suffix must not be empty".to_string(),
            ));
        }
        if self.formatter.enabled {
            if self.formatter.program.is_empty() {
                return Err(ConfigError::Validation(
                    "formatter.program must not be empty when the formatter is enabled"
                        .to_string(),
                ));
            }
            if self.formatter.timeout_secs == 0 {
                return Err(ConfigError::Validation(
                    "formatter.timeout_secs must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Build the formatter collaborator described by this config.
    pub fn build_formatter(&self) -> Box<dyn Formatter> {
        if !self.formatter.enabled {
            return Box::new(IdentityFormatter);
        }
        Box::new(CommandFormatter::new(
            self.formatter.program.clone(),
            self.formatter.args.iter().cloned(),
            Duration::from_secs(self.formatter.timeout_secs),
        ))
    }

    /// Build the version store described by this config.
    pub fn build_store(&self) -> Result<VersionStore, crate::store::StoreError> {
        match &self.backup_root {
            Some(root) => Ok(VersionStore::new(root.clone())),
            None => VersionStore::in_home(),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<ToolConfig, ConfigError> {
    let config: ToolConfig = toml_edit::de::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ToolConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents)
}
