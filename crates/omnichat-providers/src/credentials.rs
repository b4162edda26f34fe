//! Credential lookup for adapters.
//!
//! Adapters read their API key on every call, synchronously, so a
//! [`CredentialStore`] is expected to answer from memory. Slow backends
//! (OS keychains, encrypted files) should warm a [`StaticCredentials`]
//! cache at startup and hand that to the adapters.

use crate::Provider;
use omnichat_core::env::{self, vars};
use omnichat_core::SecretString;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of API keys, one per provider.
pub trait CredentialStore: Send + Sync {
    /// The secret for `provider`, if one is stored.
    fn get_secret(&self, provider: Provider) -> Option<SecretString>;
}

/// In-memory credential cache.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    secrets: RwLock<HashMap<Provider, SecretString>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`StaticCredentials::set`].
    pub fn with(self, provider: Provider, secret: impl AsRef<str>) -> Self {
        self.set(provider, secret);
        self
    }

    /// Store a secret; blank input removes the entry instead.
    pub fn set(&self, provider: Provider, secret: impl AsRef<str>) {
        let mut secrets = self.secrets.write();
        match SecretString::non_empty(secret) {
            Some(secret) => {
                secrets.insert(provider, secret);
            }
            None => {
                secrets.remove(&provider);
            }
        }
    }

    /// Forget the secret for `provider`.
    pub fn remove(&self, provider: Provider) {
        self.secrets.write().remove(&provider);
    }
}

impl CredentialStore for StaticCredentials {
    fn get_secret(&self, provider: Provider) -> Option<SecretString> {
        self.secrets.read().get(&provider).cloned()
    }
}

/// Reads API keys from the conventional environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Variable names consulted for `provider`, in priority order.
    pub fn var_names(provider: Provider) -> &'static [&'static str] {
        match provider {
            Provider::OpenAI => &[vars::OPENAI_API_KEY],
            Provider::Anthropic => &[vars::ANTHROPIC_API_KEY],
            Provider::Google => &[vars::GOOGLE_API_KEY, vars::GEMINI_API_KEY],
        }
    }
}

impl CredentialStore for EnvCredentials {
    fn get_secret(&self, provider: Provider) -> Option<SecretString> {
        env::get_first(Self::var_names(provider)).and_then(SecretString::non_empty)
    }
}
