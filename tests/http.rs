//! HTTP surface driven through the public `server::router` helper.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use resume_review::server::router;
use resume_review::{
    ChatMessage, ChatModel, ChatOptions, Extractor, ModelError, RateLimiter, ReviewConfig,
    ReviewPipeline,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Echo;

#[async_trait]
impl ChatModel for Echo {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> Result<String, ModelError> {
        Ok(r#"```json
{"overallScore": 55, "structure": {"score": 60, "tips": [{"type": "improve", "tip": "Use bullets", "explanation": "Dense paragraphs are hard to scan."}]}}
```"#
            .to_string())
    }
}

fn app(max_requests: u32) -> axum::Router {
    let config = ReviewConfig::builder()
        .rate_limit(max_requests, Duration::from_secs(60))
        .build()
        .unwrap();
    let pipeline = ReviewPipeline::new(
        config.clone(),
        RateLimiter::in_memory(config.rate_limit.clone()),
        Extractor::from_config(&config.extraction),
        Arc::new(Echo),
    );
    router(pipeline)
}

fn post(client: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header("content-type", "application/json")
        .header("x-real-ip", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn fenced_model_output_becomes_scorecard() {
    let resp = app(5)
        .oneshot(post("192.0.2.10", r#"{"resumeText": "Jane Doe"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["referrer-policy"], "strict-origin-when-cross-origin");

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["overallScore"], 55);
    assert_eq!(json["structure"]["tips"][0]["type"], "improve");
    assert_eq!(
        json["structure"]["tips"][0]["explanation"],
        "Dense paragraphs are hard to scan."
    );
    assert_eq!(json["toneAndStyle"]["score"], 0);
}

#[tokio::test]
async fn clients_are_limited_independently() {
    let app = app(1);
    let ok = app.clone().oneshot(post("192.0.2.10", r#"{"resumeText": "a"}"#)).await.unwrap();
    assert_eq!(ok.status(), 200);

    let denied = app.clone().oneshot(post("192.0.2.10", r#"{"resumeText": "a"}"#)).await.unwrap();
    assert_eq!(denied.status(), 429);

    let other = app.oneshot(post("192.0.2.11", r#"{"resumeText": "a"}"#)).await.unwrap();
    assert_eq!(other.status(), 200);
}

#[tokio::test]
async fn denied_even_when_body_is_invalid() {
    let app = app(1);
    let first = app.clone().oneshot(post("192.0.2.20", "not json")).await.unwrap();
    assert_eq!(first.status(), 400);

    let second = app.oneshot(post("192.0.2.20", r#"{"resumeText": "a"}"#)).await.unwrap();
    assert_eq!(second.status(), 429);
}
