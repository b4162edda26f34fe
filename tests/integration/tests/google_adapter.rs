//! Google adapter against mock generateContent endpoints.

use omnichat_integration_tests::{collect, factory, joined, sse_data, GOOGLE_KEY};
use omnichat_providers::{
    ChatMessage, ModelDescriptor, Provider, RequestOptions, ServiceError, StreamEvent,
    TRUNCATION_NOTICE,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE: &str = "/v1beta/models/gemini-3-pro-preview:generateContent";
const STREAM: &str = "/v1beta/models/gemini-3-pro-preview:streamGenerateContent";

fn model() -> ModelDescriptor {
    ModelDescriptor::new(Provider::Google, "gemini-3-pro-preview")
}

fn conversation() -> Vec<ChatMessage> {
    vec![ChatMessage::system("Be brief."), ChatMessage::user("Explain tides")]
}

fn truncated_response() -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"text": "The moon pulls"}, {"text": " the sea"}],
            },
            "finishReason": "MAX_TOKENS",
        }]
    })
}

fn truncated_stream() -> String {
    sse_data(&[
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"The moon pulls"}]}}]}"#,
        r#"{"candidates":[{"content":{"parts":[{"text":" the sea"}]},"finishReason":"MAX_TOKENS"}]}"#,
    ])
}

async fn mount_both(server: &MockServer, sync: ResponseTemplate, stream: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .and(header("x-goog-api-key", GOOGLE_KEY))
        .respond_with(sync)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(STREAM))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", GOOGLE_KEY))
        .and(header("accept", "text/event-stream"))
        .respond_with(stream)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_truncation_notice_in_both_modes() {
    let server = MockServer::start().await;
    mount_both(
        &server,
        ResponseTemplate::new(200).set_body_json(truncated_response()),
        ResponseTemplate::new(200).set_body_raw(truncated_stream(), "text/event-stream"),
    )
    .await;

    let adapter = factory(&server).for_model(&model());
    let options = RequestOptions::default();

    let sync = adapter.send_message(&conversation(), &model(), &options).await.unwrap();
    assert_eq!(sync, format!("The moon pulls the sea{}", TRUNCATION_NOTICE));

    let events = collect(adapter.stream_message(&conversation(), &model(), &options)).await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("The moon pulls".to_string()),
            StreamEvent::Delta(" the sea".to_string()),
            StreamEvent::Delta(TRUNCATION_NOTICE.to_string()),
            StreamEvent::Completed,
        ]
    );
    assert_eq!(joined(&events), sync);
}

#[tokio::test]
async fn test_request_shape_and_key_placement() {
    let server = MockServer::start().await;
    mount_both(
        &server,
        ResponseTemplate::new(200).set_body_json(truncated_response()),
        ResponseTemplate::new(200).set_body_raw(truncated_stream(), "text/event-stream"),
    )
    .await;

    let adapter = factory(&server).for_model(&model());
    let options = RequestOptions::default();
    adapter.send_message(&conversation(), &model(), &options).await.unwrap();
    adapter
        .stream_message(&conversation(), &model(), &options)
        .into_text()
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    for request in &requests {
        assert!(!request.url.as_str().contains(GOOGLE_KEY));

        let body: Value = request.body_json().unwrap();
        assert!(!body.to_string().contains(GOOGLE_KEY));
        assert_eq!(
            body["contents"],
            json!([{"role": "user", "parts": [{"text": "Be brief."}, {"text": "Explain tides"}]}])
        );
        assert_eq!(
            body["generationConfig"],
            json!({"maxOutputTokens": 16384, "thinkingConfig": {"thinkingLevel": "high"}})
        );
    }
}

#[tokio::test]
async fn test_malformed_chunk_is_skipped() {
    let server = MockServer::start().await;
    let body = sse_data(&[
        r#"{"candidates":[{"content":{"parts":[{"text":"Spring"}]}}]}"#,
        "{\"candidates\":[",
        r#"{"candidates":[{"content":{"parts":[{"text":" tide"}]},"finishReason":"STOP"}]}"#,
    ]);
    mount_both(
        &server,
        ResponseTemplate::new(500),
        ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
    )
    .await;

    let adapter = factory(&server).for_model(&model());
    let stream = adapter.stream_message(&conversation(), &model(), &RequestOptions::default());
    let events = collect(stream).await;

    assert_eq!(joined(&events), "Spring tide");
    assert_eq!(events.last(), Some(&StreamEvent::Completed));
}

#[tokio::test]
async fn test_forbidden_is_invalid_credential() {
    let server = MockServer::start().await;
    let forbidden = json!({"error": {
        "code": 403,
        "message": "Permission denied",
        "status": "PERMISSION_DENIED",
    }});
    mount_both(
        &server,
        ResponseTemplate::new(403).set_body_json(forbidden.clone()),
        ResponseTemplate::new(403).set_body_json(forbidden),
    )
    .await;

    let adapter = factory(&server).for_model(&model());
    let options = RequestOptions::default();

    assert_eq!(
        adapter.send_message(&conversation(), &model(), &options).await,
        Err(ServiceError::InvalidCredential)
    );
    assert_eq!(
        collect(adapter.stream_message(&conversation(), &model(), &options)).await,
        vec![StreamEvent::Failed(ServiceError::InvalidCredential)]
    );
}

#[tokio::test]
async fn test_rejected_key_on_bad_request() {
    let server = MockServer::start().await;
    let rejected = json!({"error": {
        "code": 400,
        "message": "API key not valid. Please pass a valid API key.",
        "status": "INVALID_ARGUMENT",
        "details": [{
            "@type": "type.googleapis.com/google.rpc.ErrorInfo",
            "reason": "API_KEY_INVALID",
        }],
    }});
    mount_both(
        &server,
        ResponseTemplate::new(400).set_body_json(rejected.clone()),
        ResponseTemplate::new(400).set_body_json(json!([rejected])),
    )
    .await;

    let adapter = factory(&server).for_model(&model());
    let options = RequestOptions::default();

    assert_eq!(
        adapter.send_message(&conversation(), &model(), &options).await,
        Err(ServiceError::InvalidCredential)
    );
    assert_eq!(
        adapter.stream_message(&conversation(), &model(), &options).into_text().await,
        Err(ServiceError::InvalidCredential)
    );
}

#[tokio::test]
async fn test_rate_limit_on_both_operations() {
    let server = MockServer::start().await;
    mount_both(&server, ResponseTemplate::new(429), ResponseTemplate::new(429)).await;

    let adapter = factory(&server).for_model(&model());
    let options = RequestOptions::default();

    assert_eq!(
        adapter.send_message(&conversation(), &model(), &options).await,
        Err(ServiceError::RateLimited)
    );
    assert_eq!(
        collect(adapter.stream_message(&conversation(), &model(), &options)).await,
        vec![StreamEvent::Failed(ServiceError::RateLimited)]
    );
}

#[tokio::test]
async fn test_empty_candidate_is_invalid_shape() {
    let server = MockServer::start().await;
    mount_both(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        ResponseTemplate::new(200).set_body_raw("", "text/event-stream"),
    )
    .await;

    let adapter = factory(&server).for_model(&model());
    assert_eq!(
        adapter
            .send_message(&conversation(), &model(), &RequestOptions::default())
            .await,
        Err(ServiceError::InvalidResponseShape)
    );
}

#[tokio::test]
async fn test_stream_error_envelope_keeps_message() {
    let server = MockServer::start().await;
    let failure = json!({"error": {
        "code": 500,
        "message": "Internal error",
        "status": "INTERNAL",
    }});
    mount_both(
        &server,
        ResponseTemplate::new(500).set_body_json(failure.clone()),
        ResponseTemplate::new(500).set_body_json(json!([failure])),
    )
    .await;

    let adapter = factory(&server).for_model(&model());
    let options = RequestOptions::default();
    let expected = ServiceError::server(500, Some("Internal error".to_string()));

    assert_eq!(
        adapter.send_message(&conversation(), &model(), &options).await,
        Err(expected.clone())
    );
    assert_eq!(
        collect(adapter.stream_message(&conversation(), &model(), &options)).await,
        vec![StreamEvent::Failed(expected)]
    );
}
