//! Chat adapters for Omnichat.
//!
//! This crate translates one provider-agnostic conversation into the wire
//! format of each supported vendor and decodes the answer back:
//! - OpenAI (chat completions)
//! - Anthropic (messages)
//! - Google (Gemini generateContent)
//!
//! Every adapter offers a one-shot call returning the full text and a
//! streaming call returning a cancellable [`DeltaStream`]. Failures of all
//! three vendors share the [`ServiceError`] taxonomy.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use omnichat_core::Config;
//! use omnichat_providers::{
//!     AdapterFactory, ChatMessage, EnvCredentials, ModelDescriptor, Provider, RequestOptions,
//!     StreamEvent,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = AdapterFactory::new(Arc::new(EnvCredentials), &Config::load_or_default())?;
//!     let model = ModelDescriptor::new(Provider::Anthropic, "claude-sonnet-4-5")
//!         .with_max_output_tokens(8192);
//!
//!     let messages = vec![
//!         ChatMessage::system("Answer in one sentence."),
//!         ChatMessage::user("Why is the sky blue?"),
//!     ];
//!
//!     let adapter = factory.for_model(&model);
//!     let mut stream = adapter.stream_message(&messages, &model, &RequestOptions::default());
//!     while let Some(event) = stream.next().await {
//!         match event {
//!             StreamEvent::Delta(text) => print!("{}", text),
//!             StreamEvent::Completed => break,
//!             StreamEvent::Failed(err) => return Err(err.user_message().into()),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod credentials;
mod error;
mod factory;
mod http;
mod stream;
mod types;

pub mod anthropic;
pub mod google;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use credentials::{CredentialStore, EnvCredentials, StaticCredentials};
pub use error::{Result, ServiceError};
pub use factory::AdapterFactory;
pub use google::{GoogleAdapter, TRUNCATION_NOTICE};
pub use openai::OpenAIAdapter;
pub use stream::DeltaStream;
pub use types::*;

use async_trait::async_trait;

/// One chat vendor behind a uniform interface.
///
/// Implementations hold no per-call state and can be shared behind an
/// `Arc` by any number of concurrent callers.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The vendor this adapter talks to.
    fn provider(&self) -> Provider;

    /// True if a non-empty API key is available for this provider.
    fn is_configured(&self) -> bool;

    /// Run one non-streaming call and return the assistant's full text.
    async fn send_message(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        options: &RequestOptions,
    ) -> Result<String>;

    /// Start one streaming call.
    ///
    /// Errors raised before the request is sent (such as a missing key) are
    /// reported as the stream's only event. Must be called from within a
    /// Tokio runtime.
    fn stream_message(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        options: &RequestOptions,
    ) -> DeltaStream;
}
