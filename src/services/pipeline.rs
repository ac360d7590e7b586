//! Run orchestration: pending features -> locate -> pair -> submit -> write back
//!
//! One run is a single synchronous pass. Locate and submission failures
//! abort before anything is written locally. A write-back failure is
//! rolled back and reported as a degraded outcome; the events already
//! created remotely are listed in the journal.

use crate::domain::location::{LocateStatus, LocationRecord};
use crate::error::{LocateError, RunError, WriteBackError};
use crate::infra::metrics::RunMetrics;
use crate::io::apply_edits::EditService;
use crate::io::journal::Journal;
use crate::io::locate::LocateService;
use crate::io::source::FeatureStore;
use crate::services::pairing::pair_locations;
use crate::services::write_back::{assignments, write_back};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Submit,
    /// Locate and pair only; no edits are sent and nothing is written
    DryRun,
}

#[derive(Debug)]
pub enum RunOutcome {
    NothingToDo,
    DryRun { events: usize },
    Completed { events: usize, records_updated: usize },
    /// Events exist remotely but the source features were left pending
    WriteBackFailed { events: usize, error: WriteBackError },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::WriteBackFailed { .. } => 2,
            _ => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RunOutcome::NothingToDo => "No events to update".to_string(),
            RunOutcome::DryRun { events } => {
                format!("Dry run: {} event(s) paired, nothing submitted", events)
            }
            RunOutcome::Completed { events, records_updated } => format!(
                "Successfully created {} event(s); {} feature(s) marked processed",
                events, records_updated
            ),
            RunOutcome::WriteBackFailed { events, error } => format!(
                "Created {} event(s) but could not update the source features: {}",
                events, error
            ),
        }
    }
}

pub struct Pipeline<L, E> {
    locate: L,
    edits: E,
    journal: Journal,
    metrics: RunMetrics,
}

impl<L: LocateService, E: EditService> Pipeline<L, E> {
    pub fn new(locate: L, edits: E, journal: Journal) -> Self {
        Self { locate, edits, journal, metrics: RunMetrics::new() }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Execute one run. `run_at` is the processed timestamp for every
    /// feature written back.
    pub async fn run(
        &self,
        store: &mut FeatureStore,
        run_at: DateTime<Utc>,
        mode: RunMode,
    ) -> Result<RunOutcome, RunError> {
        let features = store.pending_features()?;
        let feature_count = features.len();

        let mut records: Vec<LocationRecord> = Vec::with_capacity(feature_count * 2);
        let mut without_geometry = 0;
        for feature in features {
            let locations = feature.into_locations();
            if locations.is_empty() {
                without_geometry += 1;
            }
            records.extend(locations);
        }
        self.metrics.record_pending(feature_count, without_geometry);

        if records.is_empty() {
            info!(pending = %feature_count, "nothing_to_locate");
            return Ok(RunOutcome::NothingToDo);
        }

        let probes: Vec<_> = records.iter().map(LocationRecord::probe).collect();
        info!(probes = %probes.len(), "locate_batch_sent");
        let statuses = self.locate.locate(&probes).await?;
        if statuses.len() != probes.len() {
            let err = LocateError::Misaligned { expected: probes.len(), actual: statuses.len() };
            return Err(err.into());
        }

        let mut located = 0;
        for (record, status) in records.iter_mut().zip(statuses) {
            match &status {
                LocateStatus::Located { .. } => located += 1,
                LocateStatus::Miss { code } => {
                    debug!(
                        record_id = %record.record_id(),
                        route_id = %record.route_id(),
                        status = %code,
                        "locate_miss"
                    );
                }
                LocateStatus::Unlocated => {}
            }
            record.set_locate_result(status);
        }
        self.metrics.record_locate(probes.len(), located);

        let pairing = pair_locations(records);
        self.metrics.record_pairing(pairing.groups.len(), pairing.leftovers.len());
        let groups = pairing.groups;
        let leftovers = pairing.leftovers;

        if groups.is_empty() {
            return Ok(RunOutcome::NothingToDo);
        }

        if mode == RunMode::DryRun {
            for group in &groups {
                info!(
                    route_id = %group.route_id(),
                    side = %group.side(),
                    from_measure = %group.from_measure,
                    to_measure = %group.to_measure,
                    "dry_run_event"
                );
            }
            return Ok(RunOutcome::DryRun { events: groups.len() });
        }

        self.edits.submit(&groups).await?;
        self.metrics.record_submitted(groups.len());
        self.journal.record_submitted(run_at, &groups);

        let assigned = assignments(&groups, &leftovers);
        match write_back(store, &assigned, run_at) {
            Ok(updated) => {
                self.metrics.record_updated(updated);
                Ok(RunOutcome::Completed { events: groups.len(), records_updated: updated })
            }
            Err(e) => {
                error!(
                    events = %groups.len(),
                    journal = %self.journal.file_path(),
                    error = %e,
                    "write_back_failed"
                );
                Ok(RunOutcome::WriteBackFailed { events: groups.len(), error: e })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::NothingToDo.exit_code(), 0);
        assert_eq!(RunOutcome::DryRun { events: 1 }.exit_code(), 0);
        assert_eq!(RunOutcome::Completed { events: 1, records_updated: 1 }.exit_code(), 0);
        let failed = RunOutcome::WriteBackFailed {
            events: 1,
            error: WriteBackError::Store(crate::error::StoreError::SessionClosed),
        };
        assert_eq!(failed.exit_code(), 2);
        assert!(failed.message().contains("could not update"));
    }

    #[test]
    fn test_nothing_to_do_message() {
        assert_eq!(RunOutcome::NothingToDo.message(), "No events to update");
    }
}
