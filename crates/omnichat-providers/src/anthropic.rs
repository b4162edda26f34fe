//! Anthropic Claude adapter.
//!
//! This module provides integration with Anthropic's messages API.

use crate::credentials::CredentialStore;
use crate::http;
use crate::stream::{self, StreamDecoder};
use crate::{
    ChatMessage, ContentPart, DeltaStream, ModelDescriptor, Provider, ProviderAdapter,
    RequestOptions, Result, Role, ServiceError, StreamEvent,
};
use async_trait::async_trait;
use omnichat_core::config::HttpConfig;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Anthropic API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Anthropic API version.
const API_VERSION: &str = "2023-06-01";

/// Output ceiling for descriptors that carry none.
pub const FALLBACK_MAX_TOKENS: u32 = 8192;

/// Anthropic adapter.
pub struct AnthropicAdapter {
    /// HTTP client.
    client: Client,

    /// API key source.
    credentials: Arc<dyn CredentialStore>,

    /// API base URL.
    api_base: String,

    /// Per-request timeout; also the stream idle timeout.
    request_timeout: Duration,
}

impl AnthropicAdapter {
    /// Create an adapter with its own connection pool.
    pub fn new(credentials: Arc<dyn CredentialStore>, http_config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(http_config)?,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: http_config.request_timeout(),
        })
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    fn request(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        stream: bool,
    ) -> Result<RequestBuilder> {
        let api_key = http::auth_header(self.credentials.as_ref(), Provider::Anthropic, "")?;

        if model.provider != Provider::Anthropic {
            warn!(
                model = %model.id,
                provider = %model.provider,
                "Model routed to the Anthropic adapter"
            );
        }
        debug!("Sending request to Anthropic: model={}, stream={}", model.id, stream);

        let body = build_request(messages, model, stream);
        Ok(self
            .client
            .post(http::endpoint(&self.api_base, "v1/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body))
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn is_configured(&self) -> bool {
        http::has_secret(self.credentials.as_ref(), Provider::Anthropic)
    }

    async fn send_message(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        _options: &RequestOptions,
    ) -> Result<String> {
        let request = self
            .request(messages, model, false)?
            .timeout(self.request_timeout);

        let response = http::execute(request, Provider::Anthropic).await?;
        let response: AnthropicResponse = http::read_json(response).await?;
        response.into_text()
    }

    fn stream_message(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        _options: &RequestOptions,
    ) -> DeltaStream {
        stream::open(
            self.request(messages, model, true),
            Provider::Anthropic,
            AnthropicDecoder::default(),
            self.request_timeout,
        )
    }
}

/// Output ceiling for `model`.
fn max_tokens(model: &ModelDescriptor) -> u32 {
    match model.default_max_output_tokens {
        0 => FALLBACK_MAX_TOKENS,
        tokens => tokens,
    }
}

fn build_request(
    messages: &[ChatMessage],
    model: &ModelDescriptor,
    stream: bool,
) -> AnthropicRequest {
    let (system, turns) = http::split_system(messages);

    AnthropicRequest {
        model: model.id.clone(),
        max_tokens: max_tokens(model),
        system,
        messages: turns.into_iter().map(convert_message).collect(),
        stream,
    }
}

fn convert_message(message: &ChatMessage) -> AnthropicMessage {
    let role = match message.role() {
        Role::Assistant => "assistant",
        Role::User | Role::System => "user",
    };

    let content = if message.is_multimodal() {
        AnthropicContent::Blocks(message.contents().iter().map(convert_part).collect())
    } else {
        AnthropicContent::Text(message.text())
    };

    AnthropicMessage { role, content }
}

fn convert_part(part: &ContentPart) -> AnthropicBlock {
    match part {
        ContentPart::Text(text) => AnthropicBlock::Text { text: text.clone() },
        ContentPart::Image { data, mime_type } => AnthropicBlock::Image {
            source: Base64Source::new(mime_type, data),
        },
        ContentPart::Pdf { data } => AnthropicBlock::Document {
            source: Base64Source::new("application/pdf", data),
        },
    }
}

/// Decodes the `event:`/`data:` pairs of the messages stream.
#[derive(Default)]
struct AnthropicDecoder {
    saw_text: bool,
}

impl StreamDecoder for AnthropicDecoder {
    fn decode(&mut self, event: &str, data: &str) -> Vec<StreamEvent> {
        let explicit_error = event == "error";

        let record = match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(record) => record,
            Err(_) if explicit_error => {
                return vec![StreamEvent::Failed(ServiceError::streaming(data))];
            }
            Err(e) => {
                warn!("Skipping malformed Anthropic stream event: {}", e);
                return Vec::new();
            }
        };

        match record {
            AnthropicStreamEvent::ContentBlockStart {
                content_block: ResponseBlock::Text { .. },
            } => {
                self.saw_text = true;
                Vec::new()
            }
            AnthropicStreamEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } => {
                self.saw_text = true;
                vec![StreamEvent::Delta(text)]
            }
            AnthropicStreamEvent::Error { error } => {
                vec![StreamEvent::Failed(ServiceError::streaming(error.describe()))]
            }
            _ if explicit_error => vec![StreamEvent::Failed(ServiceError::streaming(data))],
            // A finished message without text is as malformed here as in
            // `send_message`; otherwise end of input completes the stream.
            AnthropicStreamEvent::MessageStop if !self.saw_text => {
                vec![StreamEvent::Failed(ServiceError::InvalidResponseShape)]
            }
            _ => Vec::new(),
        }
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text { text: String },
    Image { source: Base64Source },
    Document { source: Base64Source },
}

#[derive(Debug, Serialize)]
struct Base64Source {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

impl Base64Source {
    fn new(media_type: &str, data: &[u8]) -> Self {
        Self {
            source_type: "base64",
            media_type: media_type.to_string(),
            data: http::encode_base64(data),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

impl AnthropicResponse {
    /// Concatenate the text blocks; a response without any is malformed.
    fn into_text(self) -> Result<String> {
        let mut text = None::<String>;
        for block in self.content {
            if let ResponseBlock::Text { text: part } = block {
                text.get_or_insert_with(String::new).push_str(&part);
            }
        }
        text.ok_or(ServiceError::InvalidResponseShape)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockStart {
        content_block: ResponseBlock,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageStop,
    Error {
        error: StreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StreamError {
    fn describe(self) -> String {
        match (self.error_type, self.message) {
            (_, Some(message)) => message,
            (Some(error_type), None) => error_type,
            (None, None) => "Unknown streaming error".to_string(),
        }
    }
}
