//! Thin wrappers around `reqwest`/`reqwest-middleware` errors.
//!
//! The wrappers exist to strip query-string API keys out of `Display`
//! output before an error ever reaches a log line or a user-facing message.

use std::fmt;

fn redact_url(url: &url::Url) -> String {
    let mut url = url.clone();
    let _ = url.set_query(None);
    if !url.path().is_empty() && url.path() != "/" {
        url.set_path("/<redacted>");
    }
    url.to_string()
}

fn classify(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else if error.is_status() {
        format!(
            "server returned status {}",
            error.status().map_or(0, |status| status.as_u16())
        )
    } else if error.is_decode() {
        "failed to decode response body".to_string()
    } else {
        "request failed".to_string()
    }
}

fn format_reqwest_error(error: &reqwest::Error, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match error.url() {
        Some(url) => write!(f, "{} ({})", classify(error), redact_url(url)),
        None => write!(f, "{}", classify(error)),
    }
}

/// A `reqwest::Error` with its URL's query string and path redacted.
#[derive(Debug)]
pub struct ReqwestError(reqwest::Error);

impl From<reqwest::Error> for ReqwestError {
    fn from(error: reqwest::Error) -> Self {
        ReqwestError(error)
    }
}

impl fmt::Display for ReqwestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_reqwest_error(&self.0, f)
    }
}

impl std::error::Error for ReqwestError {}

/// A `reqwest_middleware::Error` with the same redaction as [`ReqwestError`].
#[derive(Debug)]
pub struct MiddlewareError(reqwest_middleware::Error);

impl From<reqwest_middleware::Error> for MiddlewareError {
    fn from(error: reqwest_middleware::Error) -> Self {
        MiddlewareError(error)
    }
}

impl fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            reqwest_middleware::Error::Reqwest(error) => format_reqwest_error(error, f),
            reqwest_middleware::Error::Middleware(error) => {
                write!(f, "middleware error: {error}")
            }
        }
    }
}

impl std::error::Error for MiddlewareError {}
