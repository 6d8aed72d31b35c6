use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use staffsync_core::{Aggregate, AggregateRoot, ApplicationId, DomainError, JobId};
use staffsync_events::Event;

/// Application status lifecycle.
///
/// Two monotonic paths: `pending → reviewing → shortlisted → hired`, or
/// `{pending, reviewing, shortlisted} → rejected`. `withdrawn` is reachable
/// from any non-terminal status. `hired`, `rejected` and `withdrawn` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Shortlisted,
    Hired,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewing,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Hired,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// An application counts against the one-per-job rule unless withdrawn.
    pub fn is_active(&self) -> bool {
        !matches!(self, ApplicationStatus::Withdrawn)
    }

    /// The applicant-facing withdraw endpoint only accepts these statuses.
    pub fn is_withdrawable(&self) -> bool {
        matches!(self, ApplicationStatus::Pending | ApplicationStatus::Reviewing)
    }

    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        match (self, next) {
            (Pending, Reviewing) | (Reviewing, Shortlisted) | (Shortlisted, Hired) => true,
            (Pending | Reviewing | Shortlisted, Rejected) => true,
            (current, Withdrawn) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl core::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of an application as returned by the marketplace endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshot {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_note: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortlisted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

/// Aggregate root: Application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    id: ApplicationId,
    job_id: Option<JobId>,
    status: ApplicationStatus,
    cover_note: Option<String>,
    received_at: Option<DateTime<Utc>>,
    reviewed_at: Option<DateTime<Utc>>,
    shortlisted_at: Option<DateTime<Utc>>,
    decided_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Application {
    /// Create an empty, not-yet-submitted aggregate instance for rehydration.
    pub fn empty(id: ApplicationId) -> Self {
        Self {
            id,
            job_id: None,
            status: ApplicationStatus::Pending,
            cover_note: None,
            received_at: None,
            reviewed_at: None,
            shortlisted_at: None,
            decided_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn cover_note(&self) -> Option<&str> {
        self.cover_note.as_deref()
    }

    /// Wire representation; `None` until the application has been submitted.
    pub fn snapshot(&self) -> Option<ApplicationSnapshot> {
        let (job_id, received_at) = match (&self.job_id, self.received_at) {
            (Some(job_id), Some(received_at)) if self.created => (job_id.clone(), received_at),
            _ => return None,
        };

        Some(ApplicationSnapshot {
            id: self.id.clone(),
            job_id,
            status: self.status,
            cover_note: self.cover_note.clone(),
            received_at,
            reviewed_at: self.reviewed_at,
            shortlisted_at: self.shortlisted_at,
            decided_at: self.decided_at,
        })
    }
}

impl AggregateRoot for Application {
    type Id = ApplicationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Submit (the `apply` endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub cover_note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReview {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Shortlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortlist {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Hire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hire {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Withdraw (the `withdraw` endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationCommand {
    Submit(Submit),
    StartReview(StartReview),
    Shortlist(Shortlist),
    Hire(Hire),
    Reject(Reject),
    Withdraw(Withdraw),
}

/// Event: Submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitted {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub cover_note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReviewStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStarted {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Shortlisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortlisted {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Hired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hired {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejected {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub application_id: ApplicationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationEvent {
    Submitted(Submitted),
    ReviewStarted(ReviewStarted),
    Shortlisted(Shortlisted),
    Hired(Hired),
    Rejected(Rejected),
    Withdrawn(Withdrawn),
}

impl Event for ApplicationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ApplicationEvent::Submitted(_) => "application.submitted",
            ApplicationEvent::ReviewStarted(_) => "application.review_started",
            ApplicationEvent::Shortlisted(_) => "application.shortlisted",
            ApplicationEvent::Hired(_) => "application.hired",
            ApplicationEvent::Rejected(_) => "application.rejected",
            ApplicationEvent::Withdrawn(_) => "application.withdrawn",
        }
    }

    fn subject(&self) -> &str {
        match self {
            ApplicationEvent::Submitted(e) => e.application_id.as_str(),
            ApplicationEvent::ReviewStarted(e) => e.application_id.as_str(),
            ApplicationEvent::Shortlisted(e) => e.application_id.as_str(),
            ApplicationEvent::Hired(e) => e.application_id.as_str(),
            ApplicationEvent::Rejected(e) => e.application_id.as_str(),
            ApplicationEvent::Withdrawn(e) => e.application_id.as_str(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ApplicationEvent::Submitted(e) => e.occurred_at,
            ApplicationEvent::ReviewStarted(e) => e.occurred_at,
            ApplicationEvent::Shortlisted(e) => e.occurred_at,
            ApplicationEvent::Hired(e) => e.occurred_at,
            ApplicationEvent::Rejected(e) => e.occurred_at,
            ApplicationEvent::Withdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Application {
    type Command = ApplicationCommand;
    type Event = ApplicationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ApplicationEvent::Submitted(e) => {
                self.id = e.application_id.clone();
                self.job_id = Some(e.job_id.clone());
                self.cover_note = e.cover_note.clone();
                self.status = ApplicationStatus::Pending;
                self.received_at = Some(e.occurred_at);
                self.created = true;
            }
            ApplicationEvent::ReviewStarted(e) => {
                self.status = ApplicationStatus::Reviewing;
                self.reviewed_at = Some(e.occurred_at);
            }
            ApplicationEvent::Shortlisted(e) => {
                self.status = ApplicationStatus::Shortlisted;
                self.shortlisted_at = Some(e.occurred_at);
            }
            ApplicationEvent::Hired(e) => {
                self.status = ApplicationStatus::Hired;
                self.decided_at = Some(e.occurred_at);
            }
            ApplicationEvent::Rejected(e) => {
                self.status = ApplicationStatus::Rejected;
                self.decided_at = Some(e.occurred_at);
            }
            ApplicationEvent::Withdrawn(e) => {
                self.status = ApplicationStatus::Withdrawn;
                self.decided_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ApplicationCommand::Submit(cmd) => self.handle_submit(cmd),
            ApplicationCommand::StartReview(cmd) => {
                self.ensure_transition(&cmd.application_id, ApplicationStatus::Reviewing)?;
                Ok(vec![ApplicationEvent::ReviewStarted(ReviewStarted {
                    application_id: cmd.application_id.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ApplicationCommand::Shortlist(cmd) => {
                self.ensure_transition(&cmd.application_id, ApplicationStatus::Shortlisted)?;
                Ok(vec![ApplicationEvent::Shortlisted(Shortlisted {
                    application_id: cmd.application_id.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ApplicationCommand::Hire(cmd) => {
                self.ensure_transition(&cmd.application_id, ApplicationStatus::Hired)?;
                Ok(vec![ApplicationEvent::Hired(Hired {
                    application_id: cmd.application_id.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ApplicationCommand::Reject(cmd) => {
                self.ensure_transition(&cmd.application_id, ApplicationStatus::Rejected)?;
                Ok(vec![ApplicationEvent::Rejected(Rejected {
                    application_id: cmd.application_id.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ApplicationCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
        }
    }
}

impl Application {
    fn ensure_transition_target(&self, application_id: &ApplicationId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if &self.id != application_id {
            return Err(DomainError::invariant("application_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(
        &self,
        application_id: &ApplicationId,
        next: ApplicationStatus,
    ) -> Result<(), DomainError> {
        self.ensure_transition_target(application_id)?;
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::invariant(format!(
                "cannot move application from {} to {}",
                self.status, next
            )))
        }
    }

    fn handle_submit(&self, cmd: &Submit) -> Result<Vec<ApplicationEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("application already exists"));
        }

        if let Some(note) = &cmd.cover_note
            && note.chars().count() > 2_000
        {
            return Err(DomainError::validation(
                "cover note must be at most 2000 characters",
            ));
        }

        Ok(vec![ApplicationEvent::Submitted(Submitted {
            application_id: cmd.application_id.clone(),
            job_id: cmd.job_id.clone(),
            cover_note: cmd.cover_note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &Withdraw) -> Result<Vec<ApplicationEvent>, DomainError> {
        self.ensure_transition_target(&cmd.application_id)?;
        if self.status == ApplicationStatus::Withdrawn {
            return Err(DomainError::conflict("application already withdrawn"));
        }
        if !self.status.is_withdrawable() {
            return Err(DomainError::invariant(format!(
                "cannot withdraw a {} application",
                self.status
            )));
        }

        Ok(vec![ApplicationEvent::Withdrawn(Withdrawn {
            application_id: cmd.application_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
