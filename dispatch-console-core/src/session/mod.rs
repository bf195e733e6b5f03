//! Console session module
//!
//! Connect flow sequencing and the console location it hands off to.

pub mod location;
pub mod orchestrator;

// Public re-exports
pub use location::{Location, Navigator};
pub use orchestrator::{BringUpPhase, ConnectOrchestrator, ConnectStatus, SubmitOutcome};
