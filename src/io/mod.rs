//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `http` - Shared reqwest client with timeout and single transient retry
//! - `locate` - geometryToMeasure client for the LRS server
//! - `apply_edits` - applyEdits submitter for the event layer
//! - `source` - SQLite feature table: pending query and scoped edit session
//! - `journal` - Submitted events to file (JSONL format)
//! - `mock_lrs` - In-process mock of the LRS endpoints

pub mod apply_edits;
pub mod http;
pub mod journal;
pub mod locate;
pub mod mock_lrs;
pub mod source;

// Re-export commonly used types
pub use apply_edits::{EditService, EditSubmitter};
pub use http::{HttpTransport, RetryPolicy};
pub use journal::Journal;
pub use locate::{LocateClient, LocateService};
pub use source::{EditSession, FeatureStore, SourceFeature, SourceFields};
