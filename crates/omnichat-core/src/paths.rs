//! Path resolution utilities.

use crate::env::{self, vars};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the Omnichat base directory (`~/.omnichat`, or `$OMNICHAT_HOME`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(vars::OMNICHAT_HOME) {
        return Ok(expand_tilde(&home));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".omnichat"))
}

/// Get the main config file path (`~/.omnichat/omnichat.json5`, or `$OMNICHAT_CONFIG`).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_var(vars::OMNICHAT_CONFIG) {
        return Ok(expand_tilde(&path));
    }
    Ok(base_dir()?.join("omnichat.json5"))
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
