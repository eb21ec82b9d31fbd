//! Environment loading
//!
//! Reads `.env` from the working directory and checks for the API key.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ConfigError, ConfigResult};

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Name of the dotenv file
pub const DOTENV_FILE: &str = ".env";

/// Load `.env` from `dir` if present. Variables already set are kept.
pub fn load_dotenv(dir: &Path) -> ConfigResult<Option<PathBuf>> {
    let path = dir.join(DOTENV_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    dotenvy::from_path(&path)?;
    debug!("Loaded environment from {}", path.display());
    Ok(Some(path))
}

/// Fetch the API key from the process environment
pub fn api_key() -> ConfigResult<String> {
    api_key_from(|name| std::env::var(name).ok())
}

/// Fetch the API key through `lookup`, rejecting blank values
pub fn api_key_from<F>(lookup: F) -> ConfigResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(API_KEY_VAR) {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingApiKey),
    }
}
