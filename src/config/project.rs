//! Project configuration
//!
//! Loads optional overrides from .learning-assistant/config.toml in the
//! working directory and merges them over the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::options::{AgentOptions, Capability, PermissionMode};
use super::prompts;

/// Configuration directory and file names
pub const CONFIG_DIR: &str = ".learning-assistant";
pub const CONFIG_FILE: &str = "config.toml";

/// Pause between demo queries
pub const DEFAULT_DEMO_PAUSE_MS: u64 = 1000;

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("ANTHROPIC_API_KEY not found in environment variables")]
    MissingApiKey,
    #[error("Failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// On-disk configuration, every key optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProjectConfig {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub allowed_tools: Option<Vec<Capability>>,
    pub permission_mode: Option<PermissionMode>,
    pub max_turns: Option<u32>,
    pub cli_path: Option<String>,
    /// Where the agent is told to keep notes
    pub notes_dir: Option<String>,
    pub initial_prompt: Option<String>,
    pub demo_queries: Option<Vec<String>>,
    pub demo_pause_ms: Option<u64>,
}

impl ProjectConfig {
    /// Default config file location for a working directory
    pub fn default_path(working_dir: &Path) -> PathBuf {
        working_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load configuration from a working directory, defaults if absent
    pub fn load(working_dir: &Path) -> ConfigResult<Self> {
        let config_path = Self::default_path(working_dir);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_file(&config_path)
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ProjectConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Agent options with this file's overrides applied
    pub fn agent_options(&self, working_dir: &Path) -> AgentOptions {
        let mut options = AgentOptions::new(working_dir);

        if let Some(model) = &self.model {
            options.model = model.clone();
        }
        options.system_prompt = match &self.system_prompt {
            Some(prompt) => prompt.clone(),
            None => prompts::system_prompt(&self.notes_dir()),
        };
        if let Some(tools) = &self.allowed_tools {
            options.allowed_tools = tools.clone();
        }
        if let Some(mode) = self.permission_mode {
            options.permission_mode = mode;
        }
        if let Some(turns) = self.max_turns {
            options.max_turns = Some(turns);
        }
        if let Some(cli_path) = &self.cli_path {
            options.cli_path = cli_path.clone();
        }

        options
    }

    /// Driver-side settings with this file's overrides applied
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            notes_dir: self.notes_dir(),
            initial_prompt: self
                .initial_prompt
                .clone()
                .unwrap_or_else(|| prompts::INITIAL_PROMPT.to_string()),
            demo_queries: self.demo_queries.clone().unwrap_or_else(|| {
                prompts::DEMO_QUERIES.iter().map(|q| q.to_string()).collect()
            }),
            demo_pause: Duration::from_millis(
                self.demo_pause_ms.unwrap_or(DEFAULT_DEMO_PAUSE_MS),
            ),
        }
    }

    fn notes_dir(&self) -> String {
        self.notes_dir
            .clone()
            .unwrap_or_else(|| prompts::DEFAULT_NOTES_DIR.to_string())
    }
}

/// Settings used by the session drivers rather than the agent client
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Notes directory named in the farewell message
    pub notes_dir: String,
    /// Prompt sent when an interactive session opens
    pub initial_prompt: String,
    /// Prompts replayed in demo mode
    pub demo_queries: Vec<String>,
    /// Pause between demo queries
    pub demo_pause: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        ProjectConfig::default().session_settings()
    }
}
