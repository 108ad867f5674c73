// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::Result;
use crate::models::SourceConfig;

/// Create a configured asynchronous HTTP client for the catalog source.
///
/// The source only answers XHR-style requests and tracks sessions through
/// cookies, so both are enabled on every request.
pub fn create_async_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .cookie_store(true)
        .build()?;
    Ok(client)
}
