use thiserror::Error;

use crate::models::Provider;

/// Failure talking to the upstream GitHub API.
///
/// None of these are retried by the library; callers decide whether to rerun
/// the whole operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// The token was missing, expired or lacked scope (401/403).
    #[error("{operation} failed: GitHub rejected the credentials ({message})")]
    Authentication { operation: String, message: String },

    /// GitHub throttled the request (403/429 with a rate-limit message).
    #[error("{operation} failed: GitHub rate limit exceeded ({message})")]
    RateLimited { operation: String, message: String },

    /// Transport-level failure before a response was received.
    #[error("{operation} failed: network error ({message})")]
    Network { operation: String, message: String },

    /// GitHub answered with a non-success status.
    #[error("{operation} failed with status {status}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("{operation} failed: could not decode response ({message})")]
    Decode { operation: String, message: String },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build GitHub client: {message}")]
    Client { message: String },
}

/// Why an existing ledger comment could not be updated.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MalformedReason {
    #[error("body does not start with the ledger marker")]
    MissingMarker,

    #[error("no line for provider {0}")]
    MissingProvider(Provider),

    #[error("more than one line for provider {0}")]
    DuplicateProvider(Provider),
}

/// Errors returned by the status gate and the deployment ledger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeployerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The ledger comment exists but its layout drifted. It is left untouched
    /// for manual remediation.
    #[error("ledger comment {comment_id} on PR #{pr_number} is malformed: {reason}")]
    MalformedLedger {
        pr_number: u64,
        comment_id: u64,
        reason: MalformedReason,
    },

    /// The value cannot be stored on a single ledger line.
    #[error("invalid value for provider {provider}: {reason}")]
    InvalidLedgerValue {
        provider: Provider,
        reason: &'static str,
    },
}

pub type DeployerResult<T> = Result<T, DeployerError>;
