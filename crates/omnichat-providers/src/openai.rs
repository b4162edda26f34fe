//! OpenAI chat completions adapter.
//!
//! This module provides integration with OpenAI's GPT models.

use crate::credentials::CredentialStore;
use crate::http;
use crate::stream::{self, StreamDecoder};
use crate::{
    ChatMessage, ContentPart, DeltaStream, ModelDescriptor, Provider, ProviderAdapter,
    RequestOptions, Result, Role, ServiceError, StreamEvent,
};
use async_trait::async_trait;
use omnichat_core::config::HttpConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default OpenAI API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// File name sent with PDF attachments; the API requires one.
const PDF_FILENAME: &str = "document.pdf";

/// End-of-stream sentinel.
const DONE_MARKER: &str = "[DONE]";

/// OpenAI adapter.
pub struct OpenAIAdapter {
    /// HTTP client.
    client: Client,

    /// API key source.
    credentials: Arc<dyn CredentialStore>,

    /// API base URL.
    api_base: String,

    /// Per-request timeout; also the stream idle timeout.
    request_timeout: Duration,
}

impl OpenAIAdapter {
    /// Create an adapter with its own connection pool.
    pub fn new(credentials: Arc<dyn CredentialStore>, http_config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(http_config)?,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: http_config.request_timeout(),
        })
    }

    /// Set the API base URL (for proxies or compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Build the authenticated request for one call.
    fn request(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        options: &RequestOptions,
        stream: bool,
    ) -> Result<RequestBuilder> {
        let auth = http::auth_header(self.credentials.as_ref(), Provider::OpenAI, "Bearer ")?;

        if model.provider != Provider::OpenAI {
            warn!(
                model = %model.id,
                provider = %model.provider,
                "Model routed to the OpenAI adapter"
            );
        }
        debug!("Sending request to OpenAI: model={}, stream={}", model.id, stream);

        let body = build_request(messages, model, options, stream);
        Ok(self
            .client
            .post(http::endpoint(&self.api_base, "chat/completions"))
            .header(AUTHORIZATION, auth)
            .json(&body))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn is_configured(&self) -> bool {
        http::has_secret(self.credentials.as_ref(), Provider::OpenAI)
    }

    async fn send_message(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        options: &RequestOptions,
    ) -> Result<String> {
        let request = self
            .request(messages, model, options, false)?
            .timeout(self.request_timeout);

        let response = http::execute(request, Provider::OpenAI).await?;
        let response: ChatResponse = http::read_json(response).await?;
        response.into_text()
    }

    fn stream_message(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        options: &RequestOptions,
    ) -> DeltaStream {
        stream::open(
            self.request(messages, model, options, true),
            Provider::OpenAI,
            OpenAIDecoder,
            self.request_timeout,
        )
    }
}

/// Translate the conversation into a chat completions body.
fn build_request(
    messages: &[ChatMessage],
    model: &ModelDescriptor,
    options: &RequestOptions,
    stream: bool,
) -> ChatRequest {
    let (system, turns) = http::split_system(messages);

    let mut wire = Vec::with_capacity(turns.len() + 1);
    if let Some(system) = system {
        wire.push(OpenAIMessage {
            role: "system",
            content: OpenAIContent::Text(system),
        });
    }
    wire.extend(turns.into_iter().map(convert_message));

    let reasoning_effort = if model.supports_reasoning_effort {
        options
            .reasoning_effort
            .openai_value(model.supports_extended_reasoning_tiers)
    } else {
        None
    };

    ChatRequest {
        model: model.id.clone(),
        messages: wire,
        stream,
        reasoning_effort,
    }
}

fn convert_message(message: &ChatMessage) -> OpenAIMessage {
    let role = match message.role() {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    let content = if message.is_multimodal() {
        OpenAIContent::Parts(message.contents().iter().map(convert_part).collect())
    } else {
        OpenAIContent::Text(message.text())
    };

    OpenAIMessage { role, content }
}

fn convert_part(part: &ContentPart) -> OpenAIContentPart {
    match part {
        ContentPart::Text(text) => OpenAIContentPart::Text { text: text.clone() },
        ContentPart::Image { data, mime_type } => OpenAIContentPart::ImageUrl {
            image_url: ImageUrl {
                url: http::data_url(mime_type, data),
            },
        },
        ContentPart::Pdf { data } => OpenAIContentPart::File {
            file: FileData {
                filename: PDF_FILENAME,
                file_data: http::data_url("application/pdf", data),
            },
        },
    }
}

/// Decodes `data:` chunks carrying `choices[0].delta.content`.
struct OpenAIDecoder;

impl StreamDecoder for OpenAIDecoder {
    fn decode(&mut self, _event: &str, data: &str) -> Vec<StreamEvent> {
        let data = data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        if data == DONE_MARKER {
            return vec![StreamEvent::Completed];
        }

        match serde_json::from_str::<ChatChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|text| !text.is_empty())
                .map(StreamEvent::Delta)
                .into_iter()
                .collect(),
            Err(e) => {
                warn!("Skipping malformed OpenAI stream chunk: {}", e);
                Vec::new()
            }
        }
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: OpenAIContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FileData },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct FileData {
    filename: &'static str,
    file_data: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ServiceError::InvalidResponseShape)
    }
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}
