use std::net::SocketAddr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use super::AppState;
use crate::error::ReviewError;
use crate::limiter::{now_ms, RateLimitDecision};
use crate::validation::AnalyzeRequest;

const ANALYSIS_FAILED: &str = "Failed to analyze resume. Please try again.";

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// `POST /api/analyze`: admission, body parsing, then the review.
///
/// The body is read by hand rather than through the `Json` extractor so the
/// rate limit is charged first and malformed bodies get a plain-text 400.
/// A body that outgrows the size cap while streaming gets 413.
pub(crate) async fn analyze_handler(State(state): State<AppState>, req: Request) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let client_id = client_identifier(req.headers(), peer);

    let decision = match state.pipeline.admit(&client_id).await {
        Ok(decision) => decision,
        Err(ReviewError::RateLimited { limit, reset_at_ms }) => {
            info!("Rate limited: client={}", client_id);
            return too_many_requests(limit, reset_at_ms);
        }
        Err(e) => {
            error!("Admission failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, ANALYSIS_FAILED).into_response();
        }
    };

    let body = match Bytes::from_request(req, &state).await {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            info!("Request body too large: client={}", client_id);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
        Err(rejection) => {
            info!("Unreadable body: {}", rejection.body_text());
            return (StatusCode::BAD_REQUEST, "Invalid JSON body").into_response();
        }
    };
    let request: AnalyzeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            info!("Invalid JSON body: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON body").into_response();
        }
    };

    match state.pipeline.review_text(&request).await {
        Ok(scorecard) => {
            let mut response = Json(scorecard).into_response();
            insert_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        Err(ReviewError::Validation(e)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            error!("Analysis error ({:?}): {}", e.kind(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, ANALYSIS_FAILED).into_response()
        }
    }
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub(crate) fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

fn too_many_requests(limit: u32, reset_at_ms: u64) -> Response {
    let retry_after = ReviewError::RateLimited { limit, reset_at_ms }
        .retry_after_secs(now_ms())
        .unwrap_or(0);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        "Too many requests. Please try again later.",
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from(retry_after));
    insert_rate_limit_headers(
        headers,
        &RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at_ms,
            limit,
        },
    );
    response
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_at_ms));
}
