//! Google Gemini adapter.
//!
//! This module provides integration with Google's Gemini models through
//! the Generative Language API.

use crate::credentials::CredentialStore;
use crate::http;
use crate::stream::{self, StreamDecoder};
use crate::{
    ChatMessage, ContentPart, DeltaStream, ModelDescriptor, Provider, ProviderAdapter,
    RequestOptions, Result, Role, ServiceError, StreamEvent,
};
use async_trait::async_trait;
use omnichat_core::config::HttpConfig;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Google AI API base URL.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Appended to the answer when the model stopped at its output limit.
pub const TRUNCATION_NOTICE: &str =
    "\n\n[Response truncated: the model reached its maximum output length.]";

/// Output ceiling for the flagship tier.
const PRO_MAX_OUTPUT_TOKENS: u32 = 16384;

/// Output ceiling for every other tier.
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Model id prefix of the thinking-capable generation.
const THINKING_MODEL_PREFIX: &str = "gemini-3";

const FINISH_MAX_TOKENS: &str = "MAX_TOKENS";

const DONE_MARKER: &str = "[DONE]";

/// Google Gemini adapter.
pub struct GoogleAdapter {
    /// HTTP client.
    client: Client,

    /// API key source.
    credentials: Arc<dyn CredentialStore>,

    /// API base URL.
    api_base: String,

    /// Per-request timeout; also the stream idle timeout.
    request_timeout: Duration,
}

impl GoogleAdapter {
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

    /// Build the request; the key travels in a header, never in the URL.
    fn request(
        &self,
        messages: &[ChatMessage],
        model: &ModelDescriptor,
        stream: bool,
    ) -> Result<RequestBuilder> {
        let api_key = http::auth_header(self.credentials.as_ref(), Provider::Google, "")?;

        if model.provider != Provider::Google {
            warn!(
                model = %model.id,
                provider = %model.provider,
                "Model routed to the Google adapter"
            );
        }
        debug!("Sending request to Google: model={}, stream={}", model.id, stream);

        let body = build_request(messages, model);
        let request = if stream {
            self.client
                .post(http::endpoint(
                    &self.api_base,
                    &format!("models/{}:streamGenerateContent", model.id),
                ))
                .query(&[("alt", "sse")])
                .header(ACCEPT, "text/event-stream")
        } else {
            self.client.post(http::endpoint(
                &self.api_base,
                &format!("models/{}:generateContent", model.id),
            ))
        };

        Ok(request.header("x-goog-api-key", api_key).json(&body))
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn is_configured(&self) -> bool {
        http::has_secret(self.credentials.as_ref(), Provider::Google)
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

        let response = http::execute(request, Provider::Google).await?;
        let response: GeminiResponse = http::read_json(response).await?;
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
            Provider::Google,
            GeminiDecoder::default(),
            self.request_timeout,
        )
    }
}

/// Static output policy: the `pro` tier gets the larger ceiling and, on
/// thinking-capable models, the deeper thinking level.
fn generation_config(model: &ModelDescriptor) -> GenerationConfig {
    let top_tier = model.id.contains("pro");

    let thinking_config = model
        .id
        .starts_with(THINKING_MODEL_PREFIX)
        .then(|| ThinkingConfig {
            thinking_level: if top_tier { "high" } else { "medium" },
        });

    GenerationConfig {
        max_output_tokens: if top_tier {
            PRO_MAX_OUTPUT_TOKENS
        } else {
            DEFAULT_MAX_OUTPUT_TOKENS
        },
        thinking_config,
    }
}

fn build_request(messages: &[ChatMessage], model: &ModelDescriptor) -> GeminiRequest {
    let (system, turns) = http::split_system(messages);
    let mut contents: Vec<GeminiContent> = turns.into_iter().map(convert_message).collect();

    // No system slot is used: the prompt leads the first user turn.
    if let Some(system) = system {
        let prompt = GeminiPart::Text { text: system };
        match contents.iter().position(|c| c.role == "user") {
            Some(index) => contents[index].parts.insert(0, prompt),
            None => contents.insert(
                0,
                GeminiContent {
                    role: "user",
                    parts: vec![prompt],
                },
            ),
        }
    }

    GeminiRequest {
        contents,
        generation_config: generation_config(model),
    }
}

fn convert_message(message: &ChatMessage) -> GeminiContent {
    let role = match message.role() {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    };

    GeminiContent {
        role,
        parts: message.contents().iter().map(convert_part).collect(),
    }
}

fn convert_part(part: &ContentPart) -> GeminiPart {
    match part {
        ContentPart::Text(text) => GeminiPart::Text { text: text.clone() },
        ContentPart::Image { data, mime_type } => GeminiPart::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.clone(),
                data: http::encode_base64(data),
            },
        },
        ContentPart::Pdf { data } => GeminiPart::InlineData {
            inline_data: InlineData {
                mime_type: "application/pdf".to_string(),
                data: http::encode_base64(data),
            },
        },
    }
}

/// Decodes `data:` chunks, each a partial `GenerateContentResponse`.
#[derive(Default)]
struct GeminiDecoder {
    /// Candidate indices that already carried the truncation notice.
    truncated: HashSet<u32>,
}

impl StreamDecoder for GeminiDecoder {
    fn decode(&mut self, _event: &str, data: &str) -> Vec<StreamEvent> {
        let data = data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        if data == DONE_MARKER {
            return vec![StreamEvent::Completed];
        }

        let chunk = match serde_json::from_str::<GeminiResponse>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Skipping malformed Gemini stream chunk: {}", e);
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for (position, candidate) in chunk.candidates.iter().enumerate() {
            let text = candidate.text();
            if !text.is_empty() {
                events.push(StreamEvent::Delta(text));
            }
            let index = candidate.index.unwrap_or(position as u32);
            if candidate.is_truncated() && self.truncated.insert(index) {
                events.push(StreamEvent::Delta(TRUNCATION_NOTICE.to_string()));
            }
        }
        events
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_level: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GeminiResponse {
    /// Text of the first candidate, with the truncation notice if it hit
    /// the output limit.
    fn into_text(self) -> Result<String> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(ServiceError::InvalidResponseShape)?;

        let mut text = candidate.text();
        if candidate.is_truncated() {
            text.push_str(TRUNCATION_NOTICE);
        }

        if text.is_empty() {
            return Err(ServiceError::InvalidResponseShape);
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl Candidate {
    /// Concatenated answer text; thought summaries are left out.
    fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|content| &content.parts)
            .filter(|part| !part.thought)
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some(FINISH_MAX_TOKENS)
    }
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}
