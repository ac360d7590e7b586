//! Submitted-event journal - appends created events to a JSONL file
//!
//! Written after the apply-edits call succeeds and before write-back, so
//! events that exist remotely can be reconciled if write-back fails.

use crate::domain::event::EventGroup;
use crate::domain::location::RecordId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, info};

#[derive(Debug, Serialize)]
struct JournalEntry<'a> {
    run_at: String,
    event_id: &'a str,
    route_id: &'a str,
    side: &'a str,
    from_measure: f64,
    to_measure: f64,
    record_ids: [RecordId; 2],
}

pub struct Journal {
    file_path: String,
}

impl Journal {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "journal_initialized");
        Self { file_path: file_path.to_string() }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Append one line per submitted event. Returns the number written.
    ///
    /// The file is opened once per call; an empty batch leaves it untouched.
    pub fn record_submitted(&self, run_at: DateTime<Utc>, groups: &[EventGroup]) -> usize {
        if groups.is_empty() {
            return 0;
        }

        let mut writer = match self.open_for_append() {
            Ok(file) => BufWriter::new(file),
            Err(e) => {
                error!(file = %self.file_path, error = %e, "journal_open_failed");
                return 0;
            }
        };

        let run_at = run_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut written = 0;

        for group in groups {
            let entry = JournalEntry {
                run_at: run_at.clone(),
                event_id: &group.event_id,
                route_id: group.route_id(),
                side: group.side(),
                from_measure: group.from_measure,
                to_measure: group.to_measure,
                record_ids: group.record_ids(),
            };

            let result = serde_json::to_string(&entry)
                .map_err(std::io::Error::from)
                .and_then(|line| writeln!(writer, "{}", line));
            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    error!(event_id = %group.event_id, error = %e, "journal_write_failed");
                }
            }
        }

        if let Err(e) = writer.flush() {
            error!(file = %self.file_path, error = %e, "journal_flush_failed");
            return 0;
        }

        info!(file = %self.file_path, entries = %written, "journal_written");
        written
    }

    fn open_for_append(&self) -> std::io::Result<File> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(file = %self.file_path, "journal_opened");
        Ok(file)
    }
}
