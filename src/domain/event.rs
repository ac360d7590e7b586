//! Linear events built from pairs of located records

use crate::domain::location::{LocationRecord, RecordId};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) event identifier
pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

/// Field names in the target event layer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventFields {
    pub route_id: String,
    pub event_id: String,
    pub from_measure: String,
    pub to_measure: String,
    pub from_date: String,
    pub side: String,
}

impl Default for EventFields {
    fn default() -> Self {
        Self {
            route_id: "ROUTE_ID".to_string(),
            event_id: "EVENT_ID".to_string(),
            from_measure: "FROM_MEASURE".to_string(),
            to_measure: "TO_MEASURE".to_string(),
            from_date: "FROM_DATE".to_string(),
            side: "GUARDRAIL_POSITION".to_string(),
        }
    }
}

impl EventFields {
    pub fn names(&self) -> [&str; 6] {
        [
            self.route_id.as_str(),
            self.event_id.as_str(),
            self.from_measure.as_str(),
            self.to_measure.as_str(),
            self.from_date.as_str(),
            self.side.as_str(),
        ]
    }
}

/// A complete pairing unit: two located records on the same route and side.
///
/// `from_measure <= to_measure` always holds.
#[derive(Debug, Clone)]
pub struct EventGroup {
    pub event_id: String,
    pub from: LocationRecord,
    pub to: LocationRecord,
    pub from_measure: f64,
    pub to_measure: f64,
}

impl EventGroup {
    /// Complete a group opened by `first` with `second`.
    ///
    /// The record with the smaller measure becomes `from`; equal measures
    /// keep arrival order.
    pub fn complete(first: (f64, LocationRecord), second: (f64, LocationRecord)) -> Self {
        let ((from_measure, from), (to_measure, to)) =
            if second.0 < first.0 { (second, first) } else { (first, second) };

        Self { event_id: new_event_id(), from, to, from_measure, to_measure }
    }

    pub fn route_id(&self) -> &str {
        self.from.route_id()
    }

    pub fn side(&self) -> &str {
        self.from.side()
    }

    pub fn record_ids(&self) -> [RecordId; 2] {
        [self.from.record_id(), self.to.record_id()]
    }

    /// Effective date of the `from` record as epoch seconds (treated as UTC).
    /// The `to` record's date is never used.
    pub fn from_date_epoch_secs(&self) -> Option<i64> {
        self.from.effective_date().map(|date| date.and_utc().timestamp())
    }

    /// Attribute map for the event layer "add" edit
    pub fn attributes(&self, fields: &EventFields, passthrough: &[String]) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert(fields.route_id.clone(), Value::from(self.route_id()));
        attributes.insert(fields.event_id.clone(), Value::from(self.event_id.as_str()));
        attributes.insert(fields.from_measure.clone(), Value::from(self.from_measure));
        attributes.insert(fields.to_measure.clone(), Value::from(self.to_measure));
        if let Some(epoch_secs) = self.from_date_epoch_secs() {
            attributes.insert(fields.from_date.clone(), Value::from(epoch_secs));
        }
        attributes.insert(fields.side.clone(), Value::from(self.side()));

        for name in passthrough {
            let value = self.from.attributes().get(name).cloned().unwrap_or(Value::Null);
            attributes.insert(name.clone(), value);
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn record(id: i64) -> LocationRecord {
        LocationRecord::new(RecordId(id), "10", "L")
    }

    #[test]
    fn test_complete_orders_by_measure() {
        let group = EventGroup::complete((20.0, record(1)), (5.0, record(2)));
        assert_eq!(group.from_measure, 5.0);
        assert_eq!(group.to_measure, 20.0);
        assert_eq!(group.record_ids(), [RecordId(2), RecordId(1)]);
    }

    #[test]
    fn test_complete_equal_measures_keep_arrival_order() {
        let group = EventGroup::complete((7.0, record(1)), (7.0, record(2)));
        assert_eq!(group.record_ids(), [RecordId(1), RecordId(2)]);
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = EventGroup::complete((1.0, record(1)), (2.0, record(2)));
        let b = EventGroup::complete((1.0, record(1)), (2.0, record(2)));
        assert_ne!(a.event_id, b.event_id);
        assert!(Uuid::parse_str(&a.event_id).is_ok());
    }

    #[test]
    fn test_attributes_mapping() {
        let date = NaiveDate::from_ymd_opt(2015, 10, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let later = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let from = record(1)
            .with_effective_date(Some(date))
            .with_attribute("GUARDRAIL_TYPE", json!("W-Beam"))
            .with_attribute("GUARDRAIL_END_TYPE", json!(3));
        let to = record(2)
            .with_effective_date(Some(later))
            .with_attribute("GUARDRAIL_TYPE", json!("Cable"));
        let group = EventGroup::complete((5.0, from), (12.0, to));

        let passthrough = vec!["GUARDRAIL_END_TYPE".to_string(), "GUARDRAIL_TYPE".to_string()];
        let attributes = group.attributes(&EventFields::default(), &passthrough);

        assert_eq!(attributes["ROUTE_ID"], json!("10"));
        assert_eq!(attributes["EVENT_ID"], json!(group.event_id));
        assert_eq!(attributes["FROM_MEASURE"], json!(5.0));
        assert_eq!(attributes["TO_MEASURE"], json!(12.0));
        assert_eq!(attributes["FROM_DATE"], json!(1_443_657_600));
        assert_eq!(attributes["GUARDRAIL_POSITION"], json!("L"));
        assert_eq!(attributes["GUARDRAIL_TYPE"], json!("W-Beam"));
        assert_eq!(attributes["GUARDRAIL_END_TYPE"], json!(3));
    }

    #[test]
    fn test_attributes_without_effective_date() {
        let group = EventGroup::complete((1.0, record(1)), (2.0, record(2)));
        let attributes = group.attributes(&EventFields::default(), &[]);
        assert!(!attributes.contains_key("FROM_DATE"));
        assert_eq!(attributes.len(), 5);
    }

    #[test]
    fn test_missing_passthrough_is_null() {
        let group = EventGroup::complete((1.0, record(1)), (2.0, record(2)));
        let attributes = group.attributes(&EventFields::default(), &["COLOR".to_string()]);
        assert_eq!(attributes["COLOR"], Value::Null);
    }
}
