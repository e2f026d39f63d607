//! HTTP helpers shared by the chat, image and speech backends

use crate::utils::truncate_str;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors of a JSON-over-HTTP call
#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection, TLS or timeout failure
    #[error("Network error: {0}")]
    Network(String),
    /// Non-success status
    #[error("{0}")]
    Api(String),
    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(String),
}

/// Creates an HTTP client with the given request timeout
#[must_use]
pub fn create_http_client(timeout_secs: u64) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends a POST with a JSON body and returns the raw response on success.
///
/// # Errors
///
/// Returns `HttpError::Network` on connectivity issues and `HttpError::Api`
/// on non-success status codes.
pub async fn post_json(
    client: &HttpClient,
    url: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> Result<reqwest::Response, HttpError> {
    let mut request = client.post(url).json(body);
    for (key, value) in headers {
        request = request.header(*key, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| HttpError::Network(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(HttpError::Api(clean_api_error(status, &error_text)));
    }

    Ok(response)
}

/// Sends a POST with a JSON body and parses the JSON response.
///
/// # Errors
///
/// Same as [`post_json`], plus `HttpError::Json` if parsing fails.
pub async fn send_json_request<T: serde::de::DeserializeOwned>(
    client: &HttpClient,
    url: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> Result<T, HttpError> {
    post_json(client, url, body, headers)
        .await?
        .json()
        .await
        .map_err(|e| HttpError::Json(e.to_string()))
}

/// Error message for a failed call, without proxy HTML pages and capped in size
fn clean_api_error(status: reqwest::StatusCode, body: &str) -> String {
    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        format!("API error: {status} (Server returned HTML error page)")
    } else if body.chars().count() > 500 {
        format!("API error: {status} - {}... (truncated)", truncate_str(body, 500))
    } else {
        format!("API error: {status} - {body}")
    }
}
