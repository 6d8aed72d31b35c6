//! Error types of the offline layer.

use thiserror::Error;

use staffsync_core::DomainError;

/// Failure of the durable action queue.
///
/// Always surfaced: a store that cannot write no longer guarantees that a
/// queued intent survives a restart.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("action queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queued action {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("failed to serialize queued action: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("action queue io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("action queue lock poisoned")]
    Poisoned,
}

/// Failure of a call to the marketplace backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (DNS, refused connection,
    /// timeout, dropped network).
    #[error("marketplace unreachable: {0}")]
    Transport(String),

    /// The backend answered with a structured domain rejection (4xx).
    #[error("request rejected ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    /// The backend failed while handling the request (5xx).
    #[error("marketplace server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("failed to decode marketplace response: {0}")]
    Decode(String),

    /// The client itself could not be built (bad base URL, TLS setup).
    #[error("marketplace client setup failed: {0}")]
    Setup(String),
}

impl ApiError {
    /// Whether the failure means "no network", the only kind of failure that
    /// turns a direct call into a queued action.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Rejected { .. })
    }

    /// A rejection meaning the requested state already holds, or can no
    /// longer be reached (HTTP 409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 409, .. })
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Rejected {
            status: err.http_status(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Failure of a direct (user-initiated) mutation.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The backend refused the request; shown to the user.
    #[error("marketplace refused the request: {0}")]
    Rejected(#[source] ApiError),

    /// The action could not be made durable.
    #[error("failed to queue action: {0}")]
    Store(#[from] StoreError),
}

/// Failure that aborts a drain.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("drain aborted, action queue unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Invalid configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_count_as_connectivity() {
        assert!(ApiError::Transport("timed out".into()).is_connectivity());
        assert!(
            !ApiError::Server {
                status: 503,
                message: "down".into()
            }
            .is_connectivity()
        );
        assert!(!ApiError::Decode("eof".into()).is_connectivity());
    }

    #[test]
    fn domain_errors_become_structured_rejections() {
        let err = ApiError::from(DomainError::conflict("application already withdrawn"));
        assert!(err.is_rejection());
        assert!(err.is_conflict());
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 409,
                code: "conflict".into(),
                message: "conflict: application already withdrawn".into(),
            }
        );

        let missing = ApiError::from(DomainError::not_found());
        assert!(missing.is_rejection());
        assert!(!missing.is_conflict());
    }
}
