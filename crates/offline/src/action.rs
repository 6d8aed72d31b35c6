//! Mutating intents the client can defer while offline.
//!
//! A [`QueuedAction`] serializes to the persisted record shape
//! `{ "id", "type", "payload", "timestamp" }`, with `type` one of
//! `"apply" | "withdraw"`, camelCase payload keys and `timestamp` in epoch
//! milliseconds.

use core::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use staffsync_core::{ActionId, ApplicationId, DomainError, JobId};

/// Tag of the remote operation an action stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Apply,
    Withdraw,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Apply => "apply",
            ActionKind::Withdraw => "withdraw",
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apply" => Ok(ActionKind::Apply),
            "withdraw" => Ok(ActionKind::Withdraw),
            other => Err(DomainError::validation(format!("unknown action type '{other}'"))),
        }
    }
}

/// Payload of an `apply` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPayload {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_note: Option<String>,
}

/// Payload of a `withdraw` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawPayload {
    pub application_id: ApplicationId,
}

/// A mutating intent, without queue bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Action {
    Apply(ApplyPayload),
    Withdraw(WithdrawPayload),
}

impl Action {
    pub fn apply(job_id: JobId, cover_note: Option<String>) -> Self {
        Action::Apply(ApplyPayload { job_id, cover_note })
    }

    pub fn withdraw(application_id: ApplicationId) -> Self {
        Action::Withdraw(WithdrawPayload { application_id })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Apply(_) => ActionKind::Apply,
            Action::Withdraw(_) => ActionKind::Withdraw,
        }
    }

    /// Backend identifier the action targets (job for apply, application
    /// for withdraw). Used in logs.
    pub fn subject(&self) -> &str {
        match self {
            Action::Apply(payload) => payload.job_id.as_str(),
            Action::Withdraw(payload) => payload.application_id.as_str(),
        }
    }

    /// Serialize only the payload object (the `payload` column of the
    /// persisted record).
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Action::Apply(payload) => serde_json::to_string(payload),
            Action::Withdraw(payload) => serde_json::to_string(payload),
        }
    }

    /// Rebuild an action from its persisted `type` tag and payload object.
    pub fn from_parts(kind: ActionKind, payload: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ActionKind::Apply => Action::Apply(serde_json::from_str(payload)?),
            ActionKind::Withdraw => Action::Withdraw(serde_json::from_str(payload)?),
        })
    }
}

/// An action recorded in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: ActionId,
    #[serde(flatten)]
    pub action: Action,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl QueuedAction {
    /// Assign a fresh id and the current time.
    ///
    /// The timestamp is truncated to whole milliseconds, the resolution it
    /// is persisted with.
    pub fn new(action: Action) -> Self {
        Self {
            id: ActionId::new(),
            action,
            timestamp: Utc::now().trunc_subsecs(3),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}
