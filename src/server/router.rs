use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::AppState;
use super::handlers::{analyze_handler, health_handler, method_not_allowed};

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

pub(crate) fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/analyze",
            post(analyze_handler).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ReviewConfig;
    use crate::error::ModelError;
    use crate::extract::Extractor;
    use crate::limiter::RateLimiter;
    use crate::model::{ChatMessage, ChatModel, ChatOptions};
    use crate::review::ReviewPipeline;

    struct FixedModel {
        reply: Result<String, ModelError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn make_router(reply: Result<String, ModelError>, max_requests: u32) -> (Router, Arc<FixedModel>) {
        let config = ReviewConfig::builder()
            .rate_limit(max_requests, Duration::from_secs(60))
            .max_retries(0)
            .build()
            .unwrap();
        let model = Arc::new(FixedModel {
            reply,
            calls: AtomicUsize::new(0),
        });
        let pipeline = ReviewPipeline::new(
            config.clone(),
            RateLimiter::in_memory(config.rate_limit.clone()),
            Extractor::from_config(&config.extraction),
            model.clone(),
        );
        (build_router(AppState { pipeline }, 1_048_576), model)
    }

    fn analyze(body: impl Into<Body>) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "198.51.100.4")
            .body(body.into())
            .unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    const CARD: &str = r#"Here: {"overallScore": 64, "ATS": {"score": 58, "tips": [{"type": "improve", "tip": "Add keywords"}]}}"#;

    #[tokio::test]
    async fn health_returns_ok_with_security_headers() {
        let (app, _) = make_router(Ok(CARD.into()), 10);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["x-frame-options"], "DENY");
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
        assert_eq!(body_text(resp).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn analyze_returns_scorecard_and_rate_limit_headers() {
        let (app, model) = make_router(Ok(CARD.into()), 10);
        let resp = app
            .oneshot(analyze(r#"{"resumeText": "Jane Doe, backend engineer", "jobTitle": "SRE"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["x-ratelimit-limit"], "10");
        assert_eq!(resp.headers()["x-ratelimit-remaining"], "9");
        assert!(resp.headers().contains_key("x-ratelimit-reset"));

        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["overallScore"], 64);
        assert_eq!(json["ATS"]["tips"][0]["type"], "improve");
        assert_eq!(json["skills"]["score"], 0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bad_bodies_are_400() {
        let (app, model) = make_router(Ok(CARD.into()), 10);

        let resp = app.clone().oneshot(analyze("{not json")).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(body_text(resp).await, "Invalid JSON body");

        let resp = app.clone().oneshot(analyze(r#"{"jobTitle": "x"}"#)).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(body_text(resp).await, "Missing resumeText");

        let long_title = "t".repeat(201);
        let body = serde_json::json!({"resumeText": "cv", "jobTitle": long_title}).to_string();
        let resp = app.oneshot(analyze(body)).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(
            body_text(resp).await,
            "Job title exceeds maximum length of 200 characters"
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let (app, _) = make_router(Ok(CARD.into()), 10);
        let req = Request::builder()
            .method("GET")
            .uri("/api/analyze")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 405);
        assert_eq!(body_text(resp).await, "Method Not Allowed");
    }

    #[tokio::test]
    async fn rate_limit_enforced_with_retry_after() {
        let (app, _) = make_router(Ok(CARD.into()), 1);
        let resp = app.clone().oneshot(analyze(r#"{"resumeText": "cv"}"#)).await.unwrap();
        assert_eq!(resp.status(), 200);

        let resp = app.oneshot(analyze(r#"{"resumeText": "cv"}"#)).await.unwrap();
        assert_eq!(resp.status(), 429);
        assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");
        let retry_after: u64 = resp.headers()["retry-after"].to_str().unwrap().parse().unwrap();
        assert!((59..=60).contains(&retry_after), "retry-after {retry_after}");
    }

    #[tokio::test]
    async fn upstream_failure_is_generic_500() {
        let (app, _) = make_router(Err(ModelError::InvalidCredentials), 10);
        let resp = app.oneshot(analyze(r#"{"resumeText": "cv"}"#)).await.unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(
            body_text(resp).await,
            "Failed to analyze resume. Please try again."
        );
    }

    #[tokio::test]
    async fn declared_oversize_body_is_rejected() {
        let (app, model) = make_router(Ok(CARD.into()), 10);
        let mut req = analyze(vec![b'a'; 2 * 1_048_576]);
        req.headers_mut()
            .insert("content-length", HeaderValue::from(2 * 1_048_576));
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 413);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undeclared_oversize_body_is_rejected_while_reading() {
        let (app, model) = make_router(Ok(CARD.into()), 10);
        let req = analyze(vec![b'a'; 2 * 1_048_576]);
        assert!(req.headers().get("content-length").is_none());

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 413);
        assert_eq!(body_text(resp).await, "Request body too large");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }
}
