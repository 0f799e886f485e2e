//! Store module
//!
//! - Blackboard: session-scoped key/value state
//! - projection: copies completed step outputs onto the blackboard

mod blackboard;
mod projection;

pub use blackboard::Blackboard;
pub use projection::{project_step_output, raw_output_key};
