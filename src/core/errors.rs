//! Error taxonomy shared by both backends
//!
//! - [`AuthError`] is fatal and aborts a run before anything is written
//! - [`FetchError`] describes a single failed per-object call
//! - [`FetchOutcome`] tells callers whether a failure is worth retrying

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while establishing a session
#[derive(Debug, Error)]
pub enum AuthError {
    /// The redirect chain did not land on the dashboard origin
    #[error("authentication failed (landed on {landed})")]
    AuthenticationFailed { landed: String },

    /// The dashboard was reached but no `token` query parameter was present
    #[error("token missing")]
    TokenMissing,

    /// The work-ledger token endpoint rejected the password grant
    #[error("work ledger rejected credentials: HTTP {status}")]
    GrantRejected { status: u16 },

    /// The token endpoint answered 2xx without an access token
    #[error("work ledger token response malformed: {0}")]
    MalformedGrant(String),

    #[error("credentials are incomplete for {0}")]
    MissingCredentials(&'static str),

    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("network error during authentication: {0}")]
    Network(#[from] reqwest::Error),
}

/// A failed per-object request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("invalid request path '{0}'")]
    InvalidPath(String),
}

impl FetchError {
    pub fn status(status: StatusCode, url: impl Into<String>) -> Self {
        FetchError::Status {
            status: status.as_u16(),
            url: url.into(),
        }
    }

    pub fn decode(url: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result of one fetch, separating absence from failure.
///
/// Replaces the "null on any problem" convention: callers can tell a missing
/// resource from an upstream hiccup and only retry the latter.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Ok(T),
    /// The backend answered 404
    NotFound,
    /// Network errors, 5xx/429/other non-200 statuses, undecodable bodies
    Transient(FetchError),
    /// 401/403 or a malformed request; retrying cannot help
    Fatal(FetchError),
}

impl<T> FetchOutcome<T> {
    /// Classify a non-200 status
    pub fn from_status(status: StatusCode, url: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => FetchOutcome::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FetchOutcome::Fatal(FetchError::status(status, url))
            }
            _ => FetchOutcome::Transient(FetchError::status(status, url)),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchOutcome::Transient(_))
    }

    /// Collapse to an option, dropping the failure detail
    pub fn ok(self) -> Option<T> {
        match self {
            FetchOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Ok(_) => "ok",
            FetchOutcome::NotFound => "not found",
            FetchOutcome::Transient(_) => "transient error",
            FetchOutcome::Fatal(_) => "fatal error",
        }
    }
}

impl<T> From<FetchError> for FetchOutcome<T> {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidPath(_) => FetchOutcome::Fatal(err),
            FetchError::Status { status, .. } if status == 401 || status == 403 => {
                FetchOutcome::Fatal(err)
            }
            FetchError::Status { status: 404, .. } => FetchOutcome::NotFound,
            _ => FetchOutcome::Transient(err),
        }
    }
}
