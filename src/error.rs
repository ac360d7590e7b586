//! Error types for the event sync run
//!
//! Locate and submission failures are fatal to a run. Write-back failures
//! are reported but leave the run in a consistent state (the edit session is
//! rolled back).

use thiserror::Error;

/// Failure of a single HTTP exchange with the LRS server
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// Connect errors, timeouts and 5xx responses are worth one more attempt
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Request(e) => e.is_connect() || e.is_timeout(),
            TransportError::Status { status, .. } => *status >= 500,
            TransportError::Client(_) | TransportError::Body(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("locate request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to encode locate request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed locate response: {source}; body: {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("locate service error {code}: {message}")]
    Service { code: i64, message: String },

    #[error("locate response has {actual} locations for {expected} probes")]
    Misaligned { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("apply edits request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to encode edits: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("apply edits did not report success: {body}")]
    Rejected { body: String },

    #[error("no events to submit")]
    EmptyBatch,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("feature store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("edit session already closed")]
    SessionClosed,
}

#[derive(Error, Debug)]
pub enum WriteBackError {
    #[error("write-back rolled back: {0}")]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for WriteBackError {
    fn from(e: rusqlite::Error) -> Self {
        WriteBackError::Store(StoreError::Sqlite(e))
    }
}

/// Fatal errors that abort a run before any write-back
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}
