//! Error taxonomy for page loading, extraction attempts and profile loading
//!
//! Only genuinely exceptional conditions live here. "Selector matched nothing",
//! "JSON-LD block did not parse" and "price text had no number" are plain
//! `Option` returns inside the extractors and never reach these types.

use std::time::Duration;

use thiserror::Error;

/// Failures raised by the page-loading collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("Navigation timeout after {}ms for URL: {url}", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Bot-block page detected (title: {0:?})")]
    Blocked(String),

    #[error("Invalid CSS selector '{0}'")]
    InvalidSelector(String),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Operation not supported by this page: {0}")]
    Unsupported(&'static str),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for PageError {
    fn from(err: reqwest::Error) -> Self {
        PageError::Http(err.to_string())
    }
}

/// Why a single scrape attempt did not produce a valid result
///
/// Both variants are retried the same way by the orchestrator; the split only
/// matters for log and triage readability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
    #[error("{0}")]
    TransientPage(#[from] PageError),

    #[error("Incomplete extraction, missing: {}", missing.join(", "))]
    IncompleteExtraction { missing: Vec<&'static str> },
}

/// Problems found while loading site profiles
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid profile YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Profile '{domain}' references unknown custom extractor '{name}'")]
    UnknownExtractor { domain: String, name: String },

    #[error("Profile '{domain}': {message}")]
    InvalidTiming { domain: String, message: String },

    #[error("Profile key '{0}' must be a bare domain (no scheme, no path, no www.)")]
    InvalidDomain(String),
}
