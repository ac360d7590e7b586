//! Services - pairing, write-back and run orchestration
//!
//! - `pairing` - groups located records into from/to measure spans
//! - `write_back` - marks source features processed in one edit session
//! - `pipeline` - runs locate, pairing, submission and write-back in order

pub mod pairing;
pub mod pipeline;
pub mod write_back;

// Re-export commonly used types
pub use pairing::{pair_locations, Pairing};
pub use pipeline::{Pipeline, RunMode, RunOutcome};
