//! Server process supervision.
//!
//! - [`classify`]: `LineClassifier`, log line to `ValidationEvent`
//! - [`process`]: `ServerSupervisor`, one boot of the base tree

pub mod classify;
pub mod process;

pub use classify::LineClassifier;
pub use process::{ServerSupervisor, SupervisorState};
