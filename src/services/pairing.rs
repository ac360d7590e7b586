//! Event pairing - turns located records into from/to measure spans
//!
//! Records are sorted by (route, side, measure) and consumed two at a time
//! within each (route, side) run. Ties on all three keys keep input order;
//! that tie-break is arbitrary but deterministic.
//!
//! A run of odd length leaves its last record unpaired. That record is
//! dropped, whether it is superseded by the next run or is the last record
//! overall, so its source feature stays pending for a later run.

use crate::domain::event::EventGroup;
use crate::domain::location::{LocationRecord, RecordId};
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct Pairing {
    pub groups: Vec<EventGroup>,
    /// Unpaired records left over from odd-length runs
    pub leftovers: Vec<RecordId>,
    /// Records without a measure, never considered for pairing
    pub unlocated: usize,
}

fn sort_key_cmp(a: &(f64, LocationRecord), b: &(f64, LocationRecord)) -> Ordering {
    a.1.route_id()
        .cmp(b.1.route_id())
        .then_with(|| a.1.side().cmp(b.1.side()))
        .then_with(|| a.0.total_cmp(&b.0))
}

fn same_run(a: &LocationRecord, b: &LocationRecord) -> bool {
    a.route_id() == b.route_id() && a.side() == b.side()
}

/// Pair located records into complete event groups
pub fn pair_locations<I>(records: I) -> Pairing
where
    I: IntoIterator<Item = LocationRecord>,
{
    let mut unlocated = 0;
    let mut located: Vec<(f64, LocationRecord)> = Vec::new();
    for record in records {
        match record.measure() {
            Some(measure) => located.push((measure, record)),
            None => unlocated += 1,
        }
    }

    // Stable: equal keys keep input order
    located.sort_by(sort_key_cmp);

    let mut groups = Vec::with_capacity(located.len() / 2);
    let mut leftovers = Vec::new();
    let mut open: Option<(f64, LocationRecord)> = None;

    for (measure, record) in located {
        match open.take() {
            Some(first) if same_run(&first.1, &record) => {
                groups.push(EventGroup::complete(first, (measure, record)));
            }
            superseded => {
                if let Some((dropped_measure, dropped)) = superseded {
                    debug!(
                        record_id = %dropped.record_id(),
                        route_id = %dropped.route_id(),
                        side = %dropped.side(),
                        measure = %dropped_measure,
                        "odd_location_dropped"
                    );
                    leftovers.push(dropped.record_id());
                }
                open = Some((measure, record));
            }
        }
    }

    if let Some((dropped_measure, dropped)) = open {
        debug!(
            record_id = %dropped.record_id(),
            route_id = %dropped.route_id(),
            side = %dropped.side(),
            measure = %dropped_measure,
            "odd_location_dropped"
        );
        leftovers.push(dropped.record_id());
    }

    info!(
        groups = %groups.len(),
        leftovers = %leftovers.len(),
        unlocated = %unlocated,
        "event_groups_paired"
    );

    Pairing { groups, leftovers, unlocated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::location::LocateStatus;

    fn located(id: i64, route: &str, side: &str, measure: f64) -> LocationRecord {
        let mut record = LocationRecord::new(RecordId(id), route, side);
        record.set_locate_result(LocateStatus::Located { measure });
        record
    }

    fn missed(id: i64, route: &str, side: &str) -> LocationRecord {
        let mut record = LocationRecord::new(RecordId(id), route, side);
        record.set_locate_result(LocateStatus::Miss { code: "esriLocatingCannotFindRoute".into() });
        record
    }

    fn span(route: &str, side: &str, from: f64, to: f64) -> (String, String, f64, f64) {
        (route.to_string(), side.to_string(), from, to)
    }

    fn spans(pairing: &Pairing) -> Vec<(String, String, f64, f64)> {
        pairing
            .groups
            .iter()
            .map(|g| (g.route_id().to_string(), g.side().to_string(), g.from_measure, g.to_measure))
            .collect()
    }

    #[test]
    fn test_odd_run_drops_last_record() {
        let pairing = pair_locations(vec![
            located(1, "10", "L", 5.0),
            located(2, "10", "L", 12.0),
            located(3, "10", "L", 20.0),
        ]);
        assert_eq!(spans(&pairing), vec![span("10", "L", 5.0, 12.0)]);
        assert_eq!(pairing.leftovers, vec![RecordId(3)]);
    }

    #[test]
    fn test_pairs_per_route_and_side() {
        let pairing = pair_locations(vec![
            located(1, "10", "L", 20.0),
            located(2, "10", "L", 5.0),
            located(3, "10", "R", 1.0),
            located(4, "10", "R", 2.0),
        ]);
        assert_eq!(
            spans(&pairing),
            vec![span("10", "L", 5.0, 20.0), span("10", "R", 1.0, 2.0)]
        );
        assert_eq!(pairing.groups[0].record_ids(), [RecordId(2), RecordId(1)]);
        assert!(pairing.leftovers.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let pairing = pair_locations(Vec::new());
        assert!(pairing.groups.is_empty());
        assert!(pairing.leftovers.is_empty());
        assert_eq!(pairing.unlocated, 0);
    }

    #[test]
    fn test_all_unlocated_yields_nothing() {
        let pairing = pair_locations(vec![missed(1, "10", "L"), missed(2, "10", "L")]);
        assert!(pairing.groups.is_empty());
        assert_eq!(pairing.unlocated, 2);
    }

    #[test]
    fn test_unlocated_never_paired() {
        let pairing = pair_locations(vec![
            located(1, "10", "L", 1.0),
            missed(2, "10", "L"),
            LocationRecord::new(RecordId(3), "10", "L"),
            located(4, "10", "L", 3.0),
        ]);
        assert_eq!(pairing.groups.len(), 1);
        assert_eq!(pairing.groups[0].record_ids(), [RecordId(1), RecordId(4)]);
        assert_eq!(pairing.unlocated, 2);
    }

    #[test]
    fn test_odd_run_superseded_by_next_run() {
        let pairing = pair_locations(vec![
            located(1, "10", "L", 1.0),
            located(2, "10", "L", 2.0),
            located(3, "10", "L", 3.0),
            located(4, "11", "L", 1.0),
            located(5, "11", "L", 4.0),
        ]);
        assert_eq!(
            spans(&pairing),
            vec![span("10", "L", 1.0, 2.0), span("11", "L", 1.0, 4.0)]
        );
        assert_eq!(pairing.leftovers, vec![RecordId(3)]);
    }

    #[test]
    fn test_sort_is_route_then_side_then_measure() {
        let pairing = pair_locations(vec![
            located(1, "B", "L", 1.0),
            located(2, "A", "R", 9.0),
            located(3, "A", "L", 8.0),
            located(4, "A", "R", 3.0),
            located(5, "A", "L", 2.0),
            located(6, "B", "L", 0.5),
        ]);
        assert_eq!(
            spans(&pairing),
            vec![
                span("A", "L", 2.0, 8.0),
                span("A", "R", 3.0, 9.0),
                span("B", "L", 0.5, 1.0),
            ]
        );
    }

    #[test]
    fn test_ties_keep_input_order() {
        let pairing = pair_locations(vec![
            located(7, "10", "L", 4.0),
            located(3, "10", "L", 4.0),
            located(9, "10", "L", 4.0),
        ]);
        assert_eq!(pairing.groups[0].record_ids(), [RecordId(7), RecordId(3)]);
        assert_eq!(pairing.leftovers, vec![RecordId(9)]);
    }

    #[test]
    fn test_even_and_odd_run_counts() {
        for n in 0..9usize {
            let records: Vec<_> =
                (0..n).map(|i| located(i as i64, "10", "L", (n - i) as f64)).collect();
            let pairing = pair_locations(records);
            assert_eq!(pairing.groups.len(), n / 2, "run length {n}");
            assert_eq!(pairing.leftovers.len(), n % 2, "run length {n}");
        }
    }

    #[test]
    fn test_from_never_exceeds_to() {
        let measures = [13.5, 2.0, 8.25, 2.0, 99.0, 0.0, 41.0, 7.0, 7.0, 3.5];
        let records: Vec<_> = measures
            .iter()
            .enumerate()
            .map(|(i, m)| located(i as i64, if i % 3 == 0 { "1" } else { "2" }, "L", *m))
            .collect();

        let pairing = pair_locations(records);
        assert!(!pairing.groups.is_empty());
        assert!(pairing.groups.iter().all(|g| g.from_measure <= g.to_measure));
        assert!(pairing
            .groups
            .iter()
            .all(|g| g.from.measure() == Some(g.from_measure) && g.to.measure() == Some(g.to_measure)));
    }

    #[test]
    fn test_repeat_pairing_same_spans() {
        let input = vec![
            located(1, "10", "L", 20.0),
            located(2, "10", "L", 5.0),
            located(3, "10", "R", 1.0),
            located(4, "10", "R", 2.0),
            located(5, "12", "L", 6.0),
        ];
        let first = pair_locations(input.clone());
        let second = pair_locations(input);

        assert_eq!(spans(&first), spans(&second));
        assert_ne!(first.groups[0].event_id, second.groups[0].event_id);
    }
}
