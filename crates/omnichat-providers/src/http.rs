//! HTTP plumbing shared by the adapters.

use crate::credentials::CredentialStore;
use crate::{ChatMessage, Provider, Result, ServiceError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use omnichat_core::config::HttpConfig;
use reqwest::header::HeaderValue;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// TCP keep-alive interval; keeps idle long-thinking connections open.
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Google's reason code for a rejected key, sent with HTTP 400.
const GOOGLE_INVALID_KEY_REASON: &str = "API_KEY_INVALID";

/// Build the pooled client an adapter keeps for its lifetime.
///
/// The client-wide timeout is the resource timeout; non-streaming calls
/// tighten it per request.
pub(crate) fn build_client(http: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(http.resource_timeout())
        .connect_timeout(http.connect_timeout())
        .pool_idle_timeout(http.pool_idle_timeout())
        .tcp_keepalive(TCP_KEEPALIVE)
        .build()
        .map_err(|e| ServiceError::network(format!("Failed to create HTTP client: {}", e)))
}

/// True if the store holds a usable secret for `provider`.
pub(crate) fn has_secret(credentials: &dyn CredentialStore, provider: Provider) -> bool {
    credentials
        .get_secret(provider)
        .is_some_and(|secret| !secret.is_blank())
}

/// Fetch the secret for `provider` as a sensitive header value.
///
/// `prefix` is prepended verbatim (e.g. `"Bearer "`).
pub(crate) fn auth_header(
    credentials: &dyn CredentialStore,
    provider: Provider,
    prefix: &str,
) -> Result<HeaderValue> {
    let secret = credentials
        .get_secret(provider)
        .filter(|secret| !secret.is_blank())
        .ok_or(ServiceError::InvalidCredential)?;

    let mut value = HeaderValue::from_str(&format!("{}{}", prefix, secret.expose_secret()))
        .map_err(|_| ServiceError::InvalidCredential)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Send a request and map any non-success status to a [`ServiceError`].
pub(crate) async fn execute(request: RequestBuilder, provider: Provider) -> Result<Response> {
    let response = request.send().await?;
    check_status(response, provider).await
}

/// Pass successful responses through; classify everything else.
pub(crate) async fn check_status(response: Response, provider: Provider) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Rate limits are reported without reading the body.
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(%provider, "Rate limited");
        return Err(ServiceError::RateLimited);
    }

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            debug!(%provider, error = %e, "Failed to read error body");
            Default::default()
        }
    };
    let err = classify_error(status, &body, provider);
    warn!(%provider, status = status.as_u16(), error = %err, "Request failed");
    Err(err)
}

/// Map a non-success status and its body to the shared taxonomy.
pub(crate) fn classify_error(status: StatusCode, body: &[u8], provider: Provider) -> ServiceError {
    let envelope = ErrorEnvelope::parse(body);

    match status.as_u16() {
        429 => ServiceError::RateLimited,
        401 => ServiceError::InvalidCredential,
        403 if provider == Provider::Google => ServiceError::InvalidCredential,
        400 if provider == Provider::Google
            && envelope
                .as_ref()
                .is_some_and(|e| e.has_reason(GOOGLE_INVALID_KEY_REASON)) =>
        {
            ServiceError::InvalidCredential
        }
        code => ServiceError::server(code, envelope.and_then(|e| e.error.message)),
    }
}

/// Read a success body as JSON.
///
/// Transport failures while reading are network errors; bytes that do not
/// parse are decoding errors.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Base64 of the raw attachment bytes.
pub(crate) fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// `data:` URL carrying base64 attachment bytes.
pub(crate) fn data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, encode_base64(data))
}

/// Split off the canonical system prompt.
///
/// The first system message wins; later ones are dropped. The remaining
/// turns keep their order.
pub(crate) fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role().is_system() {
            if system.is_none() {
                system = Some(message.text());
            } else {
                warn!("Ignoring additional system message");
            }
        } else {
            turns.push(message);
        }
    }

    (system, turns)
}

/// The `{"error": {...}}` envelope all three providers use.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

/// Google's streaming endpoint wraps the envelope in an array.
///
/// `Many` is tried first: a derived struct also accepts a sequence, which
/// would read the wrapped envelope as an empty body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Many(Vec<ErrorEnvelope>),
    One(ErrorEnvelope),
}

impl ErrorEnvelope {
    fn parse(body: &[u8]) -> Option<Self> {
        match serde_json::from_slice::<ErrorPayload>(body).ok()? {
            ErrorPayload::Many(list) => list.into_iter().next(),
            ErrorPayload::One(envelope) => Some(envelope),
        }
    }

    fn has_reason(&self, reason: &str) -> bool {
        self.error
            .details
            .iter()
            .any(|d| d.reason.as_deref() == Some(reason))
    }
}
