use serde::Deserialize;

/// Success body of the REST API: `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) data: T,
}

/// Error body of the REST API: `{"message": "..."}`.
#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Best-effort human-readable message from a failed response.
///
/// Prefers the body's `message` field, then the raw body text, then the
/// status reason phrase.
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    message_from_body(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    })
}

fn message_from_body(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return Some(parsed.message);
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
