//! Cancellation, timeouts and credential checks shared by every adapter.

use futures::StreamExt;
use omnichat_integration_tests::{config_for, credentials, factory, factory_with, sse_data};
use omnichat_providers::{
    ChatMessage, ModelDescriptor, Provider, RequestOptions, ServiceError, StaticCredentials,
    StreamEvent,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn long_openai_stream() -> String {
    let chunks: Vec<String> = (0..20)
        .map(|i| format!(r#"{{"choices":[{{"delta":{{"content":"tok{} "}}}}]}}"#, i))
        .collect();
    let mut payloads: Vec<&str> = chunks.iter().map(String::as_str).collect();
    payloads.push("[DONE]");
    sse_data(&payloads)
}

#[tokio::test]
async fn test_cancel_after_deltas_yields_nothing_further() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(long_openai_stream(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let model = ModelDescriptor::new(Provider::OpenAI, "gpt-4o");
    let messages = vec![ChatMessage::user("Count")];
    let adapter = factory(&server).for_model(&model);
    let mut stream = adapter.stream_message(&messages, &model, &RequestOptions::default());

    for i in 0..3 {
        assert_eq!(stream.next().await, Some(StreamEvent::Delta(format!("tok{} ", i))));
    }

    stream.cancel();
    assert!(stream.is_cancelled());
    assert_eq!(stream.next().await, None);

    // Cancelling is not a failure and nothing trickles in afterwards.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn test_cancel_through_token_from_another_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("event: ping\ndata: {\"type\":\"ping\"}\n\n", "text/event-stream")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let model = ModelDescriptor::new(Provider::Anthropic, "claude-haiku-4-5");
    let messages = vec![ChatMessage::user("Hi")];
    let adapter = factory(&server).for_model(&model);
    let mut stream = adapter.stream_message(&messages, &model, &RequestOptions::default());

    let token = stream.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("cancellation should end the stream promptly");
    assert_eq!(next, None);
}

#[tokio::test]
async fn test_slow_response_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.http.request_timeout_secs = 1;
    let factory = factory_with(credentials(), &config);

    let model = ModelDescriptor::new(Provider::Google, "gemini-2.5-flash");
    let messages = vec![ChatMessage::user("Hi")];
    let adapter = factory.for_model(&model);
    let options = RequestOptions::default();

    let sync = adapter.send_message(&messages, &model, &options).await;
    assert!(matches!(sync, Err(ServiceError::Network(_))), "{:?}", sync);

    let streamed = adapter.stream_message(&messages, &model, &options).into_text().await;
    assert!(matches!(streamed, Err(ServiceError::Network(_))), "{:?}", streamed);
}

#[tokio::test]
async fn test_missing_key_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = Arc::new(StaticCredentials::new().with(Provider::OpenAI, "sk-only-openai"));
    let factory = factory_with(store, &config_for(&server));
    let options = RequestOptions::default();
    let messages = vec![ChatMessage::user("Hi")];

    for (provider, id) in [
        (Provider::Anthropic, "claude-sonnet-4-5"),
        (Provider::Google, "gemini-2.5-pro"),
    ] {
        let model = ModelDescriptor::new(provider, id);
        let adapter = factory.for_model(&model);
        assert!(!adapter.is_configured());

        assert_eq!(
            adapter.send_message(&messages, &model, &options).await,
            Err(ServiceError::InvalidCredential)
        );
        assert_eq!(
            adapter.stream_message(&messages, &model, &options).into_text().await,
            Err(ServiceError::InvalidCredential)
        );
    }

    assert!(factory.for_provider(Provider::OpenAI).is_configured());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.providers.openai.base_url = Some("http://127.0.0.1:9/v1".to_string());
    let factory = factory_with(credentials(), &config);

    let model = ModelDescriptor::new(Provider::OpenAI, "gpt-4o");
    let messages = vec![ChatMessage::user("Hi")];
    let adapter = factory.for_model(&model);

    let result = adapter
        .send_message(&messages, &model, &RequestOptions::default())
        .await;
    assert!(matches!(result, Err(ServiceError::Network(_))), "{:?}", result);
}
