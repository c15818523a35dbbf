//! Typed error handling for send attempts.
//!
//! Errors are categorised the same way regardless of which collaborator
//! produced them:
//! - Permanent failures: retrying will not help (bad recipient, rejected credentials)
//! - Temporary failures: timeouts, 5xx, rate limiting
//! - System errors: the engine itself cannot proceed (store unreachable, bad config)
//!
//! Permanent and temporary failures are per-lead outcomes and are recorded on
//! the lead. System errors abort the whole processing pass.

use core::fmt::{self, Display, Formatter};

use outreach_store::StoreError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Permanent failure: {0}")]
    Permanent(#[from] PermanentError),

    #[error("Temporary failure: {0}")]
    Temporary(#[from] TemporaryError),

    #[error("System error: {0}")]
    System(#[from] SystemError),
}

#[derive(Debug, Error)]
pub enum PermanentError {
    /// The lead has no usable contact address.
    #[error("Missing recipient for lead {0}")]
    MissingRecipient(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The collaborator refused the request for a reason other than the above.
    #[error("Rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum TemporaryError {
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The collaborator answered, but not in a shape we understand.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Content generation failed: {0}")]
    GenerationFailed(String),
}

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeliveryError {
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }

    /// Classify a non-success HTTP status returned by a collaborator.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", body.trim())
        };

        match status.as_u16() {
            429 => TemporaryError::RateLimited(detail).into(),
            408 | 504 => TemporaryError::Timeout(detail).into(),
            500..=599 => TemporaryError::ServiceUnavailable(detail).into(),
            401 | 403 => PermanentError::AuthenticationFailed(detail).into(),
            400 | 422 => PermanentError::InvalidRecipient(detail).into(),
            _ => PermanentError::Rejected(detail).into(),
        }
    }
}

impl From<StoreError> for DeliveryError {
    fn from(error: StoreError) -> Self {
        Self::System(SystemError::Store(error))
    }
}

/// Convert transport-level `reqwest` failures.
///
/// - timeouts → Temporary
/// - connect failures → Temporary
/// - undecodable bodies → Temporary (the collaborator may recover)
/// - error statuses → classified by [`DeliveryError::from_status`]
/// - request construction → System (a misconfigured URL will not fix itself)
impl From<reqwest::Error> for DeliveryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TemporaryError::Timeout(error.to_string()).into()
        } else if error.is_connect() {
            TemporaryError::ConnectionFailed(error.to_string()).into()
        } else if error.is_decode() || error.is_body() {
            TemporaryError::InvalidResponse(error.to_string()).into()
        } else if let Some(status) = error.status() {
            Self::from_status(status, "")
        } else if error.is_builder() {
            SystemError::Configuration(error.to_string()).into()
        } else {
            TemporaryError::ConnectionFailed(error.to_string()).into()
        }
    }
}

/// Which step of a send attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// The lead itself is unusable (no recipient).
    Validation,
    Generation,
    Transport,
}

impl Display for FailureStage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => fmt.write_str("validation"),
            Self::Generation => fmt.write_str("generation"),
            Self::Transport => fmt.write_str("transport"),
        }
    }
}

/// A failed send attempt, tagged with the step that failed.
#[derive(Debug, Error)]
#[error("{stage}: {error}")]
pub struct AttemptFailure {
    pub stage: FailureStage,
    #[source]
    pub error: DeliveryError,
}

impl AttemptFailure {
    #[must_use]
    pub const fn new(stage: FailureStage, error: DeliveryError) -> Self {
        Self { stage, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            DeliveryError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            DeliveryError::Temporary(TemporaryError::RateLimited(_))
        ));
        assert!(matches!(
            DeliveryError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            DeliveryError::Temporary(TemporaryError::ServiceUnavailable(_))
        ));
        assert!(matches!(
            DeliveryError::from_status(StatusCode::UNAUTHORIZED, ""),
            DeliveryError::Permanent(PermanentError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            DeliveryError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad address"),
            DeliveryError::Permanent(PermanentError::InvalidRecipient(_))
        ));
        assert!(matches!(
            DeliveryError::from_status(StatusCode::NOT_FOUND, ""),
            DeliveryError::Permanent(PermanentError::Rejected(_))
        ));
    }

    #[test]
    fn test_status_detail_includes_body() {
        let err = DeliveryError::from_status(StatusCode::SERVICE_UNAVAILABLE, "  try later ");
        assert_eq!(
            err.to_string(),
            "Temporary failure: Service unavailable: 503 Service Unavailable: try later"
        );
    }

    #[test]
    fn test_error_categorization() {
        let temp = DeliveryError::Temporary(TemporaryError::Timeout("send".to_string()));
        assert!(temp.is_temporary());
        assert!(!temp.is_permanent());

        let perm = DeliveryError::Permanent(PermanentError::MissingRecipient("x".to_string()));
        assert!(perm.is_permanent());

        let sys: DeliveryError = StoreError::Internal("poisoned".to_string()).into();
        assert!(sys.is_system());
    }

    #[test]
    fn test_attempt_failure_message() {
        let failure = AttemptFailure::new(
            FailureStage::Transport,
            TemporaryError::Timeout("after 30s".to_string()).into(),
        );
        assert_eq!(
            failure.to_string(),
            "transport: Temporary failure: Timed out: after 30s"
        );
    }
}
