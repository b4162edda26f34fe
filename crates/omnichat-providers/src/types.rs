//! Common types for provider adapters.

use crate::error::ServiceError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions).
    System,
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

impl Role {
    /// Check if this is a system message.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

/// One typed unit of message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Plain text.
    Text(String),

    /// Raw image bytes with their MIME type (e.g. "image/png").
    Image { data: Bytes, mime_type: String },

    /// Raw PDF bytes.
    Pdf { data: Bytes },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create an image part.
    pub fn image(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Create a PDF part.
    pub fn pdf(data: impl Into<Bytes>) -> Self {
        Self::Pdf { data: data.into() }
    }

    /// Check if this part carries an attachment rather than text.
    pub fn is_attachment(&self) -> bool {
        !matches!(self, Self::Text(_))
    }
}

/// A chat turn: a role plus ordered, non-empty content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    role: Role,
    contents: Vec<ContentPart>,
}

impl ChatMessage {
    /// Create a message from its parts.
    ///
    /// Fails if `contents` is empty.
    pub fn new(role: Role, contents: Vec<ContentPart>) -> Result<Self, EmptyMessage> {
        if contents.is_empty() {
            return Err(EmptyMessage);
        }
        Ok(Self { role, contents })
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::from_text(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::from_text(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::from_text(Role::Assistant, text)
    }

    fn from_text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            contents: vec![ContentPart::Text(text.into())],
        }
    }

    /// Append a part, keeping insertion order.
    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.contents.push(part);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn contents(&self) -> &[ContentPart] {
        &self.contents
    }

    /// Concatenate every text part, in order.
    pub fn text(&self) -> String {
        self.contents
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Check if any part is an image or a PDF.
    pub fn is_multimodal(&self) -> bool {
        self.contents.iter().any(ContentPart::is_attachment)
    }
}

/// Returned when a message is built without any content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyMessage;

impl fmt::Display for EmptyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a chat message needs at least one content part")
    }
}

impl std::error::Error for EmptyMessage {}

/// The model vendors an adapter can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Google,
}

impl Provider {
    /// All providers, in display order.
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::Anthropic, Provider::Google];

    /// Stable lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata for one selectable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Provider-side model id (e.g. "gpt-5.1", "gemini-3-pro-preview").
    pub id: String,

    /// Vendor serving this model.
    pub provider: Provider,

    /// Accepts a reasoning-effort parameter.
    #[serde(default)]
    pub supports_reasoning_effort: bool,

    /// Belongs to the extended reasoning tier (has "xhigh", lacks "low").
    #[serde(default)]
    pub supports_extended_reasoning_tiers: bool,

    /// Output ceiling used when the wire format requires one.
    #[serde(default)]
    pub default_max_output_tokens: u32,
}

impl ModelDescriptor {
    /// Create a descriptor with no reasoning support and no explicit ceiling.
    pub fn new(provider: Provider, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            supports_reasoning_effort: false,
            supports_extended_reasoning_tiers: false,
            default_max_output_tokens: 0,
        }
    }

    /// Mark the model as accepting reasoning effort, optionally on the extended tier.
    pub fn with_reasoning(mut self, extended_tiers: bool) -> Self {
        self.supports_reasoning_effort = true;
        self.supports_extended_reasoning_tiers = extended_tiers;
        self
    }

    /// Set the output ceiling.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.default_max_output_tokens = tokens;
        self
    }
}

/// How hard a reasoning model should think before answering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Leave the provider default in place.
    #[default]
    Auto,
    None,
    Low,
    Medium,
    High,
    #[serde(rename = "xhigh")]
    XHigh,
}

impl ReasoningEffort {
    /// Wire value for OpenAI's `reasoning_effort`, or `None` to omit the field.
    ///
    /// Extended-tier models reject "low" and standard models reject "xhigh";
    /// both fall back to the nearest tier the model accepts.
    pub fn openai_value(self, extended_tiers: bool) -> Option<&'static str> {
        let value = match (self, extended_tiers) {
            (Self::Auto, _) => return None,
            (Self::None, _) => "none",
            (Self::Low, true) => "medium",
            (Self::Low, false) => "low",
            (Self::Medium, _) => "medium",
            (Self::High, _) => "high",
            (Self::XHigh, true) => "xhigh",
            (Self::XHigh, false) => "high",
        };
        Some(value)
    }
}

/// Per-call settings chosen by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Reasoning effort; only honoured by models that support it.
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
}

impl RequestOptions {
    /// Options with the given reasoning effort.
    pub fn with_reasoning_effort(effort: ReasoningEffort) -> Self {
        Self {
            reasoning_effort: effort,
        }
    }
}

/// One item of a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental assistant text.
    Delta(String),

    /// The response finished normally.
    Completed,

    /// The response failed; no further events follow.
    Failed(ServiceError),
}

impl StreamEvent {
    /// Check if this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta(_))
    }
}
