//! Write-back of generated event ids onto the source features
//!
//! Runs inside one edit session: the pending set is re-read, every feature
//! present in the assignment map gets its event id and the run timestamp,
//! and the session commits. Any failure drops the session, which rolls the
//! whole batch back.

use crate::domain::event::EventGroup;
use crate::domain::location::RecordId;
use crate::error::WriteBackError;
use crate::io::source::FeatureStore;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Source record id -> generated event id, covering both ends of every group.
///
/// Both ends of a feature share its record id, and the feature holds a
/// single event id. A feature with an end in `leftovers` gets no assignment
/// and stays pending. A feature whose ends fall into two groups keeps the
/// later group's id.
pub fn assignments(groups: &[EventGroup], leftovers: &[RecordId]) -> HashMap<RecordId, String> {
    let held: HashSet<RecordId> = leftovers.iter().copied().collect();
    let mut held_back = BTreeSet::new();
    let mut map = HashMap::with_capacity(groups.len() * 2);

    for group in groups {
        for record_id in group.record_ids() {
            if held.contains(&record_id) {
                held_back.insert(record_id);
                continue;
            }
            if let Some(replaced) = map.insert(record_id, group.event_id.clone()) {
                if replaced != group.event_id {
                    warn!(
                        record_id = %record_id,
                        kept = %group.event_id,
                        replaced = %replaced,
                        "event_assignment_overwritten"
                    );
                }
            }
        }
    }

    for record_id in held_back {
        warn!(record_id = %record_id, "feature_left_pending");
    }
    map
}

/// Mark assigned pending features as processed at `processed_at`.
/// Returns the number of features updated.
pub fn write_back(
    store: &mut FeatureStore,
    assignments: &HashMap<RecordId, String>,
    processed_at: DateTime<Utc>,
) -> Result<usize, WriteBackError> {
    let session = store.begin_edit()?;
    let pending = session.pending_ids()?;

    let mut updated = 0;
    for record_id in pending {
        let Some(event_id) = assignments.get(&record_id) else {
            continue;
        };
        updated += session.mark_processed(record_id, event_id, processed_at)?;
        debug!(record_id = %record_id, event_id = %event_id, "feature_marked_processed");
    }

    session.commit()?;
    info!(updated = %updated, assigned = %assignments.len(), "write_back_committed");
    Ok(updated)
}
