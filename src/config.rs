use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::logging::{parse_log_level, LogConfig, LogDestination, LogFormat};
use crate::plugin::runner::RunnerConfig;
use crate::plugin::settings::PluginProperties;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "PLUGBOUND_CONFIG";

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: String,
    pub file_level: Option<String>,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// Also log to the console when `file` is set
    pub console: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_level: None,
            format: LogFormat::Text,
            file: None,
            console: true,
        }
    }
}

/// `[execution]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSection {
    /// Cancel plugin operations running longer than this many seconds
    pub timeout_secs: Option<u64>,
}

/// Host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub logging: LoggingSection,
    pub execution: ExecutionSection,
    /// Per-plugin property tables keyed by plugin name
    pub plugins: BTreeMap<String, toml::Table>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl HostConfig {
    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Parse TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML content")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        parse_log_level(&self.logging.level).context("Invalid [logging] level")?;
        if let Some(level) = &self.logging.file_level {
            parse_log_level(level).context("Invalid [logging] file_level")?;
        }
        if self.execution.timeout_secs == Some(0) {
            anyhow::bail!("[execution] timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// File this configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Logger settings derived from `[logging]`
    pub fn log_config(&self) -> Result<LogConfig> {
        let section = &self.logging;
        let console_level = parse_log_level(&section.level)?;

        let (destination, file_level) = match &section.file {
            Some(file) => {
                let file_level = match &section.file_level {
                    Some(level) => parse_log_level(level)?,
                    None => console_level,
                };
                let destination = if section.console {
                    LogDestination::Both(file.clone())
                } else {
                    LogDestination::File(file.clone())
                };
                (destination, Some(file_level))
            }
            None => (LogDestination::Console, None),
        };

        Ok(LogConfig {
            console_level,
            file_level,
            format: section.format,
            destination,
        })
    }

    /// Runner settings derived from `[execution]`
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            timeout: self.execution.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Names of plugins with a property table
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Properties for the named plugin; empty when it has no table
    pub fn plugin_properties(&self, name: &str) -> Result<PluginProperties> {
        let Some(table) = self.plugins.get(name) else {
            debug!("No [plugins.{}] table, using empty properties", name);
            return Ok(PluginProperties::empty());
        };

        let value = serde_json::to_value(table)
            .with_context(|| format!("Failed to convert [plugins.{}] to properties", name))?;
        PluginProperties::from_value(value).with_context(|| format!("Invalid [plugins.{}] table", name))
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("plugbound").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".plugbound.toml"));
    }

    paths.push(PathBuf::from("./.plugbound.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}
