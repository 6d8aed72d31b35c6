use chrono::{DateTime, Utc};

/// A fact about a backend-owned resource, as mirrored on the client.
///
/// Events never change once recorded. `subject` names the resource they
/// belong to so a mixed log can be filtered per resource.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, e.g. "application.withdrawn".
    fn event_type(&self) -> &'static str;

    /// Identifier of the resource the event belongs to.
    fn subject(&self) -> &str;

    /// When the transition happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}
