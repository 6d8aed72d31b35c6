//! `staffsync-events`: domain events and in-process notification plumbing.
//!
//! - [`Event`]: the contract every domain event satisfies.
//! - [`ListenerSet`]: a callback registry (observer pattern) with RAII
//!   [`Subscription`] handles. Connectivity transitions and post-sync refresh
//!   notifications are both distributed through it.

pub mod event;
pub mod listeners;

pub use event::Event;
pub use listeners::{ListenerSet, Subscription};
