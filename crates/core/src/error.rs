//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only: malformed identifiers, illegal
/// status transitions, duplicate applications. Transport and storage
/// failures are modelled by the crates that perform IO.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated (e.g. a transition out of a terminal status).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// The requested change conflicts with current state
    /// (e.g. an active application already exists for the job).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stable machine-readable code, as carried in backend rejection bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation",
            DomainError::InvariantViolation(_) => "invalid_transition",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::Unauthorized => "unauthorized",
        }
    }

    /// HTTP status the marketplace backend answers with for this rejection.
    pub fn http_status(&self) -> u16 {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => 422,
            DomainError::InvariantViolation(_) | DomainError::Conflict(_) => 409,
            DomainError::NotFound => 404,
            DomainError::Unauthorized => 401,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicting_transitions_map_to_409() {
        assert_eq!(DomainError::conflict("already withdrawn").http_status(), 409);
        assert_eq!(DomainError::invariant("terminal").http_status(), 409);
        assert_eq!(DomainError::not_found().http_status(), 404);
    }

    #[test]
    fn display_includes_detail() {
        let err = DomainError::conflict("application already withdrawn");
        assert_eq!(err.to_string(), "conflict: application already withdrawn");
        assert_eq!(err.code(), "conflict");
    }
}
