//! Per-user collection of applications.
//!
//! Enforces the rule that spans aggregates: a job seeker holds at most one
//! active (non-withdrawn) application per job.

use chrono::{DateTime, Utc};

use staffsync_core::{Aggregate, AggregateRoot, ApplicationId, DomainError, DomainResult, JobId};
use staffsync_events::Event;

use crate::application::{
    Application, ApplicationCommand, ApplicationEvent, ApplicationSnapshot, ApplicationStatus,
    Hire, Reject, Shortlist, StartReview, Submit, Withdraw,
};

/// Applications of a single job seeker, in submission order, plus the log
/// of every transition they went through.
#[derive(Debug, Clone, Default)]
pub struct ApplicationBook {
    applications: Vec<Application>,
    history: Vec<ApplicationEvent>,
}

impl ApplicationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a new application for `job_id`.
    pub fn submit(
        &mut self,
        job_id: JobId,
        cover_note: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ApplicationSnapshot> {
        if self.active_for_job(&job_id).is_some() {
            return Err(DomainError::conflict(format!(
                "an active application already exists for job {job_id}"
            )));
        }

        let application_id = ApplicationId::generate();
        let mut application = Application::empty(application_id.clone());
        let events = application.execute(&ApplicationCommand::Submit(Submit {
            application_id,
            job_id,
            cover_note,
            occurred_at,
        }))?;

        let snapshot = Self::snapshot_of(&application)?;
        self.applications.push(application);
        self.history.extend(events);
        Ok(snapshot)
    }

    /// Withdraw an application on the applicant's behalf.
    pub fn withdraw(
        &mut self,
        application_id: &ApplicationId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ApplicationSnapshot> {
        self.advance(application_id, ApplicationStatus::Withdrawn, occurred_at)
    }

    /// Move an application to `next` (reviewer-side transitions included).
    pub fn advance(
        &mut self,
        application_id: &ApplicationId,
        next: ApplicationStatus,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ApplicationSnapshot> {
        let application_id = application_id.clone();
        let command = match next {
            ApplicationStatus::Pending => {
                return Err(DomainError::invariant(
                    "pending is only reachable by submitting",
                ));
            }
            ApplicationStatus::Reviewing => ApplicationCommand::StartReview(StartReview {
                application_id,
                occurred_at,
            }),
            ApplicationStatus::Shortlisted => ApplicationCommand::Shortlist(Shortlist {
                application_id,
                occurred_at,
            }),
            ApplicationStatus::Hired => ApplicationCommand::Hire(Hire {
                application_id,
                occurred_at,
            }),
            ApplicationStatus::Rejected => ApplicationCommand::Reject(Reject {
                application_id,
                occurred_at,
            }),
            ApplicationStatus::Withdrawn => ApplicationCommand::Withdraw(Withdraw {
                application_id,
                occurred_at,
            }),
        };

        let target = command_target(&command).clone();
        let application = self
            .applications
            .iter_mut()
            .find(|a| a.id() == &target)
            .ok_or_else(DomainError::not_found)?;

        let events = application.execute(&command)?;
        let snapshot = Self::snapshot_of(application)?;
        self.history.extend(events);
        Ok(snapshot)
    }

    pub fn get(&self, application_id: &ApplicationId) -> Option<ApplicationSnapshot> {
        self.applications
            .iter()
            .find(|a| a.id() == application_id)
            .and_then(Application::snapshot)
    }

    /// The active application for `job_id`, if any.
    pub fn active_for_job(&self, job_id: &JobId) -> Option<ApplicationSnapshot> {
        self.applications
            .iter()
            .find(|a| a.job_id() == Some(job_id) && a.status().is_active())
            .and_then(Application::snapshot)
    }

    /// Transitions recorded for one application, oldest first.
    pub fn history(&self, application_id: &ApplicationId) -> Vec<&ApplicationEvent> {
        self.history
            .iter()
            .filter(|e| e.subject() == application_id.as_str())
            .collect()
    }

    pub fn snapshots(&self) -> Vec<ApplicationSnapshot> {
        self.applications
            .iter()
            .filter_map(Application::snapshot)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    fn snapshot_of(application: &Application) -> DomainResult<ApplicationSnapshot> {
        application
            .snapshot()
            .ok_or_else(|| DomainError::invariant("application has not been submitted"))
    }
}

fn command_target(command: &ApplicationCommand) -> &ApplicationId {
    match command {
        ApplicationCommand::Submit(c) => &c.application_id,
        ApplicationCommand::StartReview(c) => &c.application_id,
        ApplicationCommand::Shortlist(c) => &c.application_id,
        ApplicationCommand::Hire(c) => &c.application_id,
        ApplicationCommand::Reject(c) => &c.application_id,
        ApplicationCommand::Withdraw(c) => &c.application_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> JobId {
        JobId::parse(id).unwrap()
    }

    #[test]
    fn submit_creates_pending_application() {
        let mut book = ApplicationBook::new();
        let snapshot = book.submit(job("J1"), None, Utc::now()).unwrap();

        assert_eq!(snapshot.status, ApplicationStatus::Pending);
        assert_eq!(snapshot.job_id, job("J1"));
        assert_eq!(book.get(&snapshot.id), Some(snapshot));
    }

    #[test]
    fn second_active_application_for_same_job_conflicts() {
        let mut book = ApplicationBook::new();
        book.submit(job("J1"), None, Utc::now()).unwrap();

        let err = book.submit(job("J1"), None, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(msg) if msg.contains("J1")));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn can_reapply_after_withdrawing() {
        let mut book = ApplicationBook::new();
        let first = book.submit(job("J1"), None, Utc::now()).unwrap();
        book.withdraw(&first.id, Utc::now()).unwrap();

        let second = book.submit(job("J1"), Some("Back again".into()), Utc::now()).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(book.active_for_job(&job("J1")).unwrap().id, second.id);
    }

    #[test]
    fn rejected_application_still_blocks_the_job() {
        let mut book = ApplicationBook::new();
        let app = book.submit(job("J1"), None, Utc::now()).unwrap();
        book.advance(&app.id, ApplicationStatus::Rejected, Utc::now()).unwrap();

        assert!(book.submit(job("J1"), None, Utc::now()).is_err());
    }

    #[test]
    fn withdraw_unknown_application_is_not_found() {
        let mut book = ApplicationBook::new();
        let err = book
            .withdraw(&ApplicationId::parse("missing").unwrap(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn history_lists_transitions_per_application() {
        let mut book = ApplicationBook::new();
        let first = book.submit(job("J1"), None, Utc::now()).unwrap();
        let second = book.submit(job("J2"), None, Utc::now()).unwrap();
        book.advance(&first.id, ApplicationStatus::Reviewing, Utc::now()).unwrap();
        book.withdraw(&first.id, Utc::now()).unwrap();

        let types: Vec<_> = book.history(&first.id).iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                "application.submitted",
                "application.review_started",
                "application.withdrawn",
            ]
        );
        assert_eq!(book.history(&second.id).len(), 1);

        let times: Vec<_> = book.history(&first.id).iter().map(|e| e.occurred_at()).collect();
        assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn refused_transition_leaves_no_history() {
        let mut book = ApplicationBook::new();
        let app = book.submit(job("J1"), None, Utc::now()).unwrap();
        book.advance(&app.id, ApplicationStatus::Hired, Utc::now()).unwrap_err();

        assert_eq!(book.history(&app.id).len(), 1);
    }

    #[test]
    fn advance_to_pending_is_refused() {
        let mut book = ApplicationBook::new();
        let app = book.submit(job("J1"), None, Utc::now()).unwrap();
        assert!(book.advance(&app.id, ApplicationStatus::Pending, Utc::now()).is_err());
    }
}
