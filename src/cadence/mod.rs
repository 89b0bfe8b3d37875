//! Review cadence
//!
//! Pure stage machine: given a record and "reviewed" event, compute the
//! next due date and the resulting record changes. Consuming the event on
//! the host and persisting the changes is the engine's job.

pub mod algorithm;
pub mod dates;

pub use algorithm::{advance, ReviewOutcome};
