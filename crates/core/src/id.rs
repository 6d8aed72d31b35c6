//! Strongly-typed identifiers used across the domain.
//!
//! Two families live here:
//! - locally minted identifiers (`ActionId`) backed by UUIDv7;
//! - identifiers owned by the marketplace backend (`JobId`, `ApplicationId`),
//!   which are opaque strings this client never interprets.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a queued action (assigned at enqueue time).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(ActionId, "ActionId");

/// Identifier of a job posting (backend-owned).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

/// Identifier of a job application (backend-owned).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

macro_rules! impl_opaque_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a backend identifier. Blank identifiers are rejected.
            pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, ": empty")));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_opaque_newtype!(JobId, "JobId");
impl_opaque_newtype!(ApplicationId, "ApplicationId");

impl ApplicationId {
    /// Mint a fresh identifier (used by in-memory backends).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_ids_are_time_ordered() {
        let first = ActionId::new();
        let second = ActionId::new();
        assert!(first < second);
    }

    #[test]
    fn action_id_round_trips_through_display() {
        let id = ActionId::new();
        let parsed: ActionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn malformed_action_id_is_invalid_id() {
        let err = "not-a-uuid".parse::<ActionId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.starts_with("ActionId")));
    }

    #[test]
    fn opaque_ids_accept_backend_strings() {
        let job = JobId::parse("J1").unwrap();
        assert_eq!(job.as_str(), "J1");
        assert_eq!(job.to_string(), "J1");
    }

    #[test]
    fn blank_opaque_ids_are_rejected() {
        assert!(JobId::parse("").is_err());
        assert!("   ".parse::<ApplicationId>().is_err());
    }

    #[test]
    fn opaque_ids_serialize_transparently() {
        let id = ApplicationId::parse("A1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"A1\"");
        let back: ApplicationId = serde_json::from_str("\"A1\"").unwrap();
        assert_eq!(back, id);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn action_id_display_parses_back(bits in any::<u128>()) {
                let id = ActionId::from_uuid(Uuid::from_u128(bits));
                let parsed: ActionId = id.to_string().parse().unwrap();
                prop_assert_eq!(parsed, id);
            }

            #[test]
            fn blank_backend_ids_are_always_rejected(blank in "[ \t\n]{0,8}") {
                prop_assert!(JobId::parse(blank.clone()).is_err());
                prop_assert!(ApplicationId::parse(blank).is_err());
            }

            #[test]
            fn backend_ids_are_kept_verbatim(raw in "[A-Za-z0-9_-]{1,16}") {
                let id = JobId::parse(raw.clone()).unwrap();
                prop_assert_eq!(id.as_str(), raw.as_str());
            }
        }
    }
}
