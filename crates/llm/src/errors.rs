//! Classification of HTTP failures into [`ServiceErrorKind`].
//!
//! Every HTTP-backed client in orgchat (generation, embeddings, knowledge)
//! goes through these helpers, so retry and degradation decisions only ever
//! see structured categories.

use orgchat_core::{AppError, ServiceErrorKind};
use serde_json::Value;

/// Structured error codes that mean "quota exhausted" rather than a
/// transient rate limit.
const QUOTA_CODES: &[&str] = &["insufficient_quota", "quota_exceeded", "RESOURCE_EXHAUSTED"];

/// Map a reqwest transport failure (no HTTP status available).
pub fn transport_error(service: &'static str, err: &reqwest::Error) -> AppError {
    let kind = if err.is_timeout() {
        ServiceErrorKind::Timeout
    } else if err.is_decode() {
        ServiceErrorKind::InvalidResponse
    } else if let Some(status) = err.status() {
        ServiceErrorKind::from_status(status.as_u16(), false)
    } else {
        ServiceErrorKind::Network
    };

    AppError::service(service, kind, err.to_string())
}

/// Map a non-success HTTP response, given its status and body text.
pub fn status_error(service: &'static str, status: u16, body: &str) -> AppError {
    let kind = ServiceErrorKind::from_status(status, has_quota_marker(body));
    let detail = error_message(body).unwrap_or_else(|| body.trim().to_string());
    AppError::service(service, kind, format!("HTTP {}: {}", status, detail))
}

/// Map an error object embedded in an otherwise successful stream.
pub fn stream_payload_error(service: &'static str, payload: &Value) -> AppError {
    let kind = if payload_has_quota_code(payload) {
        ServiceErrorKind::Quota
    } else {
        ServiceErrorKind::Server
    };
    let message = payload_message(payload).unwrap_or_else(|| payload.to_string());
    AppError::service(service, kind, message)
}

/// Whether a JSON error body carries one of the quota codes.
///
/// Looks at `error.code`, `error.type`, `error.status` and the same keys at
/// the top level, which covers OpenAI- and Google-style error envelopes.
pub fn has_quota_marker(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|value| payload_has_quota_code(&value))
        .unwrap_or(false)
}

fn payload_has_quota_code(value: &Value) -> bool {
    let scopes = [value.get("error"), Some(value)];
    scopes.into_iter().flatten().any(|scope| {
        ["code", "type", "status"].iter().any(|key| {
            scope
                .get(*key)
                .and_then(Value::as_str)
                .is_some_and(|code| QUOTA_CODES.contains(&code))
        })
    })
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| payload_message(&value))
}

fn payload_message(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quota_marker_openai_style() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        assert!(has_quota_marker(body));

        let err = status_error("llm", 429, body);
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Quota));
        assert!(err.to_string().contains("You exceeded your current quota"));
    }

    #[test]
    fn test_quota_marker_google_style() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(has_quota_marker(body));
    }

    #[test]
    fn test_plain_rate_limit() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
        let err = status_error("llm", 429, body);
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::RateLimit));
    }

    #[test]
    fn test_non_json_body() {
        let err = status_error("knowledge", 503, "upstream unavailable");
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Server));
        assert!(err.to_string().contains("upstream unavailable"));

        let err = status_error("knowledge", 404, "");
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Client));
    }

    #[test]
    fn test_ollama_error_string() {
        let err = status_error("llm", 500, r#"{"error":"model runner crashed"}"#);
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Server));
        assert!(err.to_string().contains("model runner crashed"));
    }

    #[test]
    fn test_stream_payload_error() {
        let quota = json!({"error": {"message": "quota", "code": "insufficient_quota"}});
        assert_eq!(
            stream_payload_error("llm", &quota).service_kind(),
            Some(ServiceErrorKind::Quota)
        );

        let other = json!({"error": "overloaded"});
        let err = stream_payload_error("llm", &other);
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Server));
        assert!(err.to_string().contains("overloaded"));
    }
}
