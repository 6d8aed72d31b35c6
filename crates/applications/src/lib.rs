//! Job application domain module.
//!
//! The marketplace backend owns applications; this crate mirrors its status
//! machine as deterministic domain logic (no IO, no HTTP, no storage) so that
//! fakes, optimistic UI state and replay classification agree with the
//! backend's contract.

pub mod application;
pub mod book;

pub use application::{
    Application, ApplicationCommand, ApplicationEvent, ApplicationSnapshot, ApplicationStatus,
    Hire, Hired, Reject, Rejected, ReviewStarted, Shortlist, Shortlisted, StartReview, Submit,
    Submitted, Withdraw, Withdrawn,
};
pub use book::ApplicationBook;
