use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::alert::AlertId;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("alert service returned status {0}")]
    Status(StatusCode),
    #[error("alert request timed out after {0:?}")]
    Timeout(Duration),
    #[error("alert service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid alert request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(err) => !(err.is_decode() || err.is_builder()),
            Self::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Timeout(_) | Self::Unavailable(_) => true,
            Self::InvalidRequest(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feedback service returned status {0}")]
    Status(StatusCode),
    #[error("submission for alert {0} rejected: {1}")]
    Rejected(AlertId, String),
}

#[derive(Debug, Error)]
pub enum InterestsError {
    #[error("select at least {required} interests ({selected} selected)")]
    TooFew { required: usize, selected: usize },
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Failure of a non-critical analytics event. Never surfaced as a user-facing error.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("analytics service returned status {0}")]
    Status(StatusCode),
    #[error("analytics event rejected: {0}")]
    Rejected(String),
    #[error("analytics task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parsing error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("refresh task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
