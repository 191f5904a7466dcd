//! Connection admission: attempt throttling, per-identity and global limits,
//! and liveness sweeping.

pub mod controller;
pub mod sweeper;
pub mod throttle;

pub use controller::AdmissionController;
pub use sweeper::spawn_sweeper;
pub use throttle::{AttemptTracker, AttemptWindow};
