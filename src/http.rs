//! Shared plumbing for the remote service clients

use crate::{CoachError, Result};
use reqwest::{Client, Response};
use std::time::Duration;

/// Build a client with a request timeout
pub(crate) fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CoachError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into `CoachError::RemoteStatus`
pub(crate) async fn ensure_success(response: Response, service: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| format!("Failed to read {} error body", service));
    Err(CoachError::RemoteStatus {
        status: status.as_u16(),
        message: format!("{}: {}", service, truncate(&body, 200)),
    })
}

/// Require a configured key
pub(crate) fn require_key(key: Option<&String>, service: &str) -> Result<String> {
    match key.map(|k| k.trim()) {
        Some(k) if !k.is_empty() => Ok(k.to_string()),
        _ => Err(CoachError::ConfigError(format!("{} API key is not set", service))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
