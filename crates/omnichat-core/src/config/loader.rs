//! Reading, writing and checking `omnichat.json5`.

use super::{Config, EndpointConfig};
use crate::env::{self, vars};
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

impl Config {
    /// Read the config file at its resolved location.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON5 text into a `Config`.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Write the config as pretty JSON, replacing `path` via a temp file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // temp file + rename
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Like [`Config::load_default`], but a missing file yields the defaults.
    ///
    /// Environment overrides are applied in both cases. A file that exists
    /// but fails to parse or validate is logged and replaced by defaults.
    pub fn load_or_default() -> Self {
        let mut config = match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                warn!("Ignoring invalid config file: {}", e);
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// Apply overrides taken from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(secs) = env::get_u64(vars::OMNICHAT_REQUEST_TIMEOUT) {
            if secs > 0 {
                self.http.request_timeout_secs = secs;
                if self.http.resource_timeout_secs < secs {
                    self.http.resource_timeout_secs = secs;
                }
            }
        }
    }

    /// Check timeouts and base URLs, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Timeouts must be positive
        let timeouts = [
            ("request_timeout_secs", self.http.request_timeout_secs),
            ("resource_timeout_secs", self.http.resource_timeout_secs),
            ("connect_timeout_secs", self.http.connect_timeout_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                errors.push(format!("http.{} must be greater than 0", name));
            }
        }

        // 2. The whole call cannot be shorter than a single request
        if self.http.resource_timeout_secs < self.http.request_timeout_secs {
            errors.push(format!(
                "http.resource_timeout_secs ({}) is shorter than request_timeout_secs ({})",
                self.http.resource_timeout_secs, self.http.request_timeout_secs
            ));
        }

        // 3. Endpoint overrides must be http(s) URLs
        let endpoints = [
            ("openai", &self.providers.openai),
            ("anthropic", &self.providers.anthropic),
            ("google", &self.providers.google),
        ];
        for (name, endpoint) in endpoints {
            if let Some(err) = validate_endpoint(name, endpoint) {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

fn validate_endpoint(name: &str, endpoint: &EndpointConfig) -> Option<String> {
    let base_url = endpoint.base_url.as_deref()?;
    match url::Url::parse(base_url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => None,
        Ok(parsed) => Some(format!(
            "providers.{}.base_url has unsupported scheme '{}'",
            name,
            parsed.scheme()
        )),
        Err(e) => Some(format!(
            "providers.{}.base_url '{}' is not a valid URL: {}",
            name, base_url, e
        )),
    }
}
