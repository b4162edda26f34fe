//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get the first non-empty variable out of `names`.
pub fn get_first(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| get_var(name))
}

/// Get an environment variable as a u64 (e.g., for timeouts).
pub fn get_u64(name: &str) -> Option<u64> {
    get_var(name).and_then(|v| v.trim().parse().ok())
}

/// Common environment variable names.
pub mod vars {
    /// API key for OpenAI.
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

    /// API key for Anthropic.
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

    /// API key for Google.
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

    /// Alternate API key name for Google.
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

    /// Omnichat home directory override.
    pub const OMNICHAT_HOME: &str = "OMNICHAT_HOME";

    /// Omnichat config file override.
    pub const OMNICHAT_CONFIG: &str = "OMNICHAT_CONFIG";

    /// Request timeout override, in seconds.
    pub const OMNICHAT_REQUEST_TIMEOUT: &str = "OMNICHAT_REQUEST_TIMEOUT";
}
