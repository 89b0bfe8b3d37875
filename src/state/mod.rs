//! Identity and progress state
//!
//! One [`ItemRecord`] per memorization item, keyed by normalized title and
//! re-associated with its item through an embedded stable identifier.

mod models;
mod storage;

pub use models::*;
pub use storage::{StateError, StateStore};
