//! Adapter selection.

use crate::credentials::CredentialStore;
use crate::{
    AnthropicAdapter, GoogleAdapter, ModelDescriptor, OpenAIAdapter, Provider, ProviderAdapter,
    Result,
};
use omnichat_core::config::EndpointConfig;
use omnichat_core::Config;
use std::sync::Arc;
use tracing::debug;

/// Hands out the adapter for a provider or a model.
///
/// Each adapter is built once, so every provider keeps one connection pool
/// for the lifetime of the factory.
#[derive(Clone)]
pub struct AdapterFactory {
    openai: Arc<OpenAIAdapter>,
    anthropic: Arc<AnthropicAdapter>,
    google: Arc<GoogleAdapter>,
}

impl AdapterFactory {
    /// Build all adapters from one credential source and configuration.
    pub fn new(credentials: Arc<dyn CredentialStore>, config: &Config) -> Result<Self> {
        let providers = &config.providers;

        let mut openai = OpenAIAdapter::new(credentials.clone(), &config.http)?;
        if let Some(url) = base_url(&providers.openai, Provider::OpenAI) {
            openai = openai.with_base_url(url);
        }

        let mut anthropic = AnthropicAdapter::new(credentials.clone(), &config.http)?;
        if let Some(url) = base_url(&providers.anthropic, Provider::Anthropic) {
            anthropic = anthropic.with_base_url(url);
        }

        let mut google = GoogleAdapter::new(credentials, &config.http)?;
        if let Some(url) = base_url(&providers.google, Provider::Google) {
            google = google.with_base_url(url);
        }

        Ok(Self {
            openai: Arc::new(openai),
            anthropic: Arc::new(anthropic),
            google: Arc::new(google),
        })
    }

    /// The adapter serving `provider`.
    pub fn for_provider(&self, provider: Provider) -> Arc<dyn ProviderAdapter> {
        match provider {
            Provider::OpenAI => self.openai.clone(),
            Provider::Anthropic => self.anthropic.clone(),
            Provider::Google => self.google.clone(),
        }
    }

    /// The adapter serving `model`, chosen by its provider.
    pub fn for_model(&self, model: &ModelDescriptor) -> Arc<dyn ProviderAdapter> {
        self.for_provider(model.provider)
    }

    /// Providers that currently have an API key, in display order.
    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|provider| self.for_provider(*provider).is_configured())
            .collect()
    }
}

fn base_url(endpoint: &EndpointConfig, provider: Provider) -> Option<&str> {
    let url = endpoint.base_url.as_deref()?;
    debug!(%provider, url, "Using custom base URL");
    Some(url)
}
