//! Spaced-repetition scheduling for memorization items that live as tasks
//! in an external task list.
//!
//! One pass ("tick") reconciles item identity, advances reviewed items
//! through the daily → weekly → monthly → mastered cadence, and pulls new
//! items in from the backlog.

pub mod cadence;
pub mod config;
pub mod content;
pub mod engine;
pub mod host;
pub mod reference;
pub mod resolver;
pub mod state;
pub mod suggest;
pub mod visibility;

pub use config::CadenceConfig;
pub use engine::{Scheduler, TickReport};
pub use host::{HostError, HostItem, JsonTaskHost, TaskHost};
pub use state::{ItemRecord, Stage, StateStore};
