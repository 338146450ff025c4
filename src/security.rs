use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{convert::Infallible, sync::Arc};
use tracing::{info, warn};

pub const HOOK_KEY_HEADER: &str = "X-Hook-Key";

/// Shared-secret check in front of the notification endpoint. Without a
/// configured secret every request is let through.
#[derive(Clone, Default)]
pub struct HookGuard {
    secret: Option<Arc<str>>,
}

impl HookGuard {
    pub fn new(secret: Option<String>) -> Self {
        let secret: Option<Arc<str>> = secret
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(Arc::from);
        if secret.is_none() {
            warn!(
                target: "sync.api",
                "EVENTS_SHARED_SECRET not set; /events accepts unauthenticated notifications"
            );
        } else {
            info!(target: "sync.api", "notification endpoint protected by shared secret");
        }
        Self { secret }
    }

    fn accepts(&self, presented: &str) -> bool {
        match &self.secret {
            Some(secret) => constant_time_eq(secret.as_bytes(), presented.as_bytes()),
            None => true,
        }
    }
}

pub async fn require_hook_key(
    State(guard): State<HookGuard>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    if guard.secret.is_none() {
        return Ok(next.run(request).await);
    }

    let Some(presented) = extract_hook_key(request.headers()) else {
        return Ok(unauthorized_response(
            "missing_hook_key",
            "Provide X-Hook-Key or Bearer token",
        ));
    };

    if !guard.accepts(&presented) {
        warn!(target: "sync.api", "rejected notification with unknown key");
        return Ok(unauthorized_response("invalid_hook_key", "Key not recognized"));
    }

    Ok(next.run(request).await)
}

fn extract_hook_key(headers: &http::HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get(HOOK_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unauthorized_response(code: &str, message: &str) -> Response {
    let payload = ApiError {
        error: code.to_string(),
        detail: Some(message.to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}
