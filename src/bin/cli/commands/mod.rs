pub mod host;
pub mod preview;
pub mod run;
pub mod stale;
pub mod state;
