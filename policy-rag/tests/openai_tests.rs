//! OpenAI adapters against a local stub speaking the OpenAI wire format.

#![cfg(feature = "openai")]

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use policy_rag::openai::{OpenAIEmbeddingProvider, OpenAIGenerator};
use policy_rag::{EmbeddingProvider, FailureKind, GenerationParams, Generator, RagError};
use serde_json::{Value, json};

/// Serve `status` and `body` for every request and return the base URL.
async fn spawn_canned(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().fallback(move || async move {
        (status, [(header::CONTENT_TYPE, "application/json")], body)
    });
    serve(app).await
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    format!("http://{addr}/v1/")
}

fn generator(base: &str) -> OpenAIGenerator {
    OpenAIGenerator::new("sk-test").unwrap().with_base_url(base)
}

fn embedder(base: &str, dims: usize) -> OpenAIEmbeddingProvider {
    OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(base).with_dimensions(dims)
}

fn generation_kind(result: policy_rag::Result<String>) -> FailureKind {
    match result {
        Err(RagError::GenerationServiceError { kind, .. }) => kind,
        other => panic!("expected a generation failure, got {other:?}"),
    }
}

fn embedding_kind(result: policy_rag::Result<Vec<Vec<f32>>>) -> FailureKind {
    match result {
        Err(RagError::EmbeddingError { kind, .. }) => kind,
        other => panic!("expected an embedding failure, got {other:?}"),
    }
}

async fn chat(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}})));
    }
    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default().to_string();
    let reply = json!({
        "choices": [{"message": {"role": "assistant", "content": format!("  echo: {prompt}\n")}}]
    });
    (StatusCode::OK, Json(reply))
}

#[tokio::test]
async fn completion_sends_the_prompt_and_trims_the_reply() {
    let base = serve(Router::new().route("/v1/chat/completions", post(chat))).await;

    let generator = generator(&base);
    let params = GenerationParams::default();
    let answer = generator.generate("When are core hours?", &params);
    assert_eq!(answer.await.unwrap(), "echo: When are core hours?");
}

#[tokio::test]
async fn rejected_key_is_fatal_and_carries_the_api_message() {
    let base = spawn_canned(
        StatusCode::UNAUTHORIZED,
        r#"{"error": {"message": "Incorrect API key provided"}}"#,
    )
    .await;

    let result = generator(&base).generate("q", &GenerationParams::default()).await;
    match result {
        Err(RagError::GenerationServiceError { kind, message, .. }) => {
            assert_eq!(kind, FailureKind::Fatal);
            assert!(message.contains("Incorrect API key provided"));
        }
        other => panic!("expected a generation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limits_and_outages_are_retryable() {
    for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
        let base = spawn_canned(status, r#"{"error": {"message": "try later"}}"#).await;
        let result = generator(&base).generate("q", &GenerationParams::default()).await;
        assert_eq!(generation_kind(result), FailureKind::Retryable, "status {status}");
    }
}

#[tokio::test]
async fn unparseable_completion_is_fatal() {
    let base = spawn_canned(StatusCode::OK, r#"{"choices": "nope"#).await;
    let result = generator(&base).generate("q", &GenerationParams::default()).await;
    assert_eq!(generation_kind(result), FailureKind::Fatal);
}

#[tokio::test]
async fn empty_completions_are_retryable() {
    for body in [
        r#"{"choices": []}"#,
        r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
        r#"{"choices": [{"message": {"role": "assistant", "content": "   "}}]}"#,
    ] {
        let base = spawn_canned(StatusCode::OK, body).await;
        let result = generator(&base).generate("q", &GenerationParams::default()).await;
        match result {
            Err(RagError::GenerationServiceError { kind, message, .. }) => {
                assert_eq!(kind, FailureKind::Retryable, "body {body}");
                assert_eq!(message, "empty completion");
            }
            other => panic!("expected an empty completion failure, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn embeddings_are_returned_in_input_order() {
    let base = spawn_canned(
        StatusCode::OK,
        r#"{"data": [
            {"index": 1, "embedding": [0.0, 1.0, 0.0]},
            {"index": 0, "embedding": [1.0, 0.0, 0.0]}
        ]}"#,
    )
    .await;

    let vectors = embedder(&base, 3).embed_batch(&["first", "second"]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn embedding_status_failures_are_classified() {
    let base = spawn_canned(StatusCode::UNAUTHORIZED, r#"{"error": {"message": "bad key"}}"#).await;
    assert_eq!(embedding_kind(embedder(&base, 3).embed_batch(&["a"]).await), FailureKind::Fatal);

    let base = spawn_canned(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;
    assert_eq!(embedding_kind(embedder(&base, 3).embed_batch(&["a"]).await), FailureKind::Retryable);

    let base = spawn_canned(StatusCode::OK, "not json").await;
    assert_eq!(embedding_kind(embedder(&base, 3).embed_batch(&["a"]).await), FailureKind::Fatal);
}

#[tokio::test]
async fn wrong_sized_embeddings_are_rejected() {
    let base = spawn_canned(StatusCode::OK, r#"{"data": [{"index": 0, "embedding": [1.0, 0.0]}]}"#).await;

    let result = embedder(&base, 3).embed("a").await;
    assert!(matches!(result, Err(RagError::DimensionMismatch { expected: 3, actual: 2 })));
}

#[tokio::test]
async fn unreachable_server_is_retryable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = format!("http://{addr}/v1");
    let result = generator(&base).generate("q", &GenerationParams::default()).await;
    assert_eq!(generation_kind(result), FailureKind::Retryable);
}
