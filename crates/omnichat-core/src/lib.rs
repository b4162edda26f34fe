//! # omnichat-core
//!
//! Configuration, secrets, and shared utilities for Omnichat.
//!
//! This crate provides functionality used by the provider adapters:
//!
//! - **Configuration**: Loading and validation of the JSON5 config file
//! - **Secrets**: A zeroizing, redacting string for API keys
//! - **Utilities**: Path resolution and environment handling

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use secret::SecretString;
