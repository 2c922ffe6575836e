//! HTTP utilities for GCP REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Maximum length of an error message shown to the user
const MAX_ERROR_LENGTH: usize = 300;

/// Non-success status returned by a GCP API
///
/// Carried inside `anyhow::Error` so callers can classify failures by
/// downcasting instead of matching on message text.
#[derive(Debug, Clone, thiserror::Error)]
#[error("API request failed: {status}")]
pub struct ApiError {
    pub status: StatusCode,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// Find an [`ApiError`] anywhere in an error's context chain
pub fn api_error(err: &anyhow::Error) -> Option<&ApiError> {
    err.chain().find_map(|cause| cause.downcast_ref::<ApiError>())
}

/// Whether an error chain carries a 404 from the API
pub fn is_not_found(err: &anyhow::Error) -> bool {
    api_error(err).is_some_and(ApiError::is_not_found)
}

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gcp-discovery/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str, query: &[(String, String)]) -> Result<Value> {
        tracing::debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            if status == StatusCode::NOT_FOUND {
                tracing::debug!("API not found: {} - {}", url, sanitize_for_log(&body));
            } else {
                tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            }
            return Err(ApiError { status }.into());
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format a GCP API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    if let Some(api) = api_error(error) {
        return match api.status.as_u16() {
            401 => "Authentication failed. Run 'gcloud auth application-default login'.".to_string(),
            403 => "Permission denied. Check your GCP IAM permissions.".to_string(),
            404 => "Resource not found.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            400 => "Invalid request. Check your parameters.".to_string(),
            500 | 503 => "GCP service temporarily unavailable. Please try again.".to_string(),
            _ => "Request failed. Check your network connection and try again.".to_string(),
        };
    }

    // Truncate long error messages and remove potential sensitive data
    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(MAX_ERROR_LENGTH)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
