//! Location records - one observed point tied to a route
//!
//! A source line feature yields two records (leading and trailing vertex)
//! that share its record id. Identity, route, side and edit metadata are
//! fixed at construction; the locate result is written exactly once.

use crate::domain::geometry::Point;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Status code the locate service reports for a successfully located point
pub const LOCATE_OK: &str = "esriLocatingOK";

/// Newtype wrapper for source feature identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of locating one probe against the route network.
///
/// A measure only exists on `Located`, so nothing downstream can read a
/// measure for a point the service did not place.
#[derive(Debug, Clone, PartialEq)]
pub enum LocateStatus {
    /// Not sent to the locate service yet
    Unlocated,
    Located { measure: f64 },
    /// Service answered with a non-OK status code
    Miss { code: String },
}

impl LocateStatus {
    /// Map a raw service status and optional measure into a status
    pub fn from_service(code: &str, measure: Option<f64>) -> Self {
        match measure {
            Some(measure) if code == LOCATE_OK => LocateStatus::Located { measure },
            _ => LocateStatus::Miss { code: code.to_string() },
        }
    }

    pub fn code(&self) -> &str {
        match self {
            LocateStatus::Unlocated => "",
            LocateStatus::Located { .. } => LOCATE_OK,
            LocateStatus::Miss { code } => code,
        }
    }
}

/// Geometry probe sent to the locate service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Probe {
    #[serde(rename = "routeId")]
    pub route_id: String,
    pub geometry: ProbeGeometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeGeometry {
    pub x: f64,
    pub y: f64,
}

/// One end point of a source feature.
///
/// Fields other than the locate result are set through the constructor and
/// `with_*` builders only.
#[derive(Debug, Clone)]
pub struct LocationRecord {
    record_id: RecordId,
    route_id: String,
    side: String,
    point: Point,
    event_id: Option<String>,
    effective_date: Option<NaiveDateTime>,
    edit_user: Option<String>,
    edit_date: Option<NaiveDateTime>,
    /// Passthrough attributes copied verbatim into the created event
    attributes: BTreeMap<String, Value>,
    status: LocateStatus,
}

impl LocationRecord {
    pub fn new(record_id: RecordId, route_id: impl Into<String>, side: impl Into<String>) -> Self {
        Self {
            record_id,
            route_id: route_id.into(),
            side: side.into(),
            point: Point { x: 0.0, y: 0.0 },
            event_id: None,
            effective_date: None,
            edit_user: None,
            edit_date: None,
            attributes: BTreeMap::new(),
            status: LocateStatus::Unlocated,
        }
    }

    pub fn with_point(mut self, point: Point) -> Self {
        self.point = point;
        self
    }

    pub fn with_effective_date(mut self, date: Option<NaiveDateTime>) -> Self {
        self.effective_date = date;
        self
    }

    /// Event id already on the source feature plus last-edit metadata
    pub fn with_edit_metadata(
        mut self,
        event_id: Option<String>,
        edit_user: Option<String>,
        edit_date: Option<NaiveDateTime>,
    ) -> Self {
        self.event_id = event_id;
        self.edit_user = edit_user;
        self.edit_date = edit_date;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    pub fn side(&self) -> &str {
        &self.side
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn effective_date(&self) -> Option<NaiveDateTime> {
        self.effective_date
    }

    pub fn edit_user(&self) -> Option<&str> {
        self.edit_user.as_deref()
    }

    pub fn edit_date(&self) -> Option<NaiveDateTime> {
        self.edit_date
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn status(&self) -> &LocateStatus {
        &self.status
    }

    /// Route measure, defined only when the locate service returned OK
    pub fn measure(&self) -> Option<f64> {
        match self.status {
            LocateStatus::Located { measure } => Some(measure),
            _ => None,
        }
    }

    /// Record the locate result. Only the first result is kept.
    pub fn set_locate_result(&mut self, status: LocateStatus) -> bool {
        if self.status != LocateStatus::Unlocated {
            warn!(
                record_id = %self.record_id,
                existing = %self.status.code(),
                "locate_result_already_set"
            );
            return false;
        }
        self.status = status;
        true
    }

    pub fn probe(&self) -> Probe {
        Probe {
            route_id: self.route_id.clone(),
            geometry: ProbeGeometry { x: self.point.x, y: self.point.y },
        }
    }
}

/// Decode source text into a canonical UTF-8 string.
///
/// Valid UTF-8 is kept as is; anything else is read as Latin-1, which maps
/// every byte to the code point of the same value.
pub fn normalize_text(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_requires_ok_status() {
        let mut record = LocationRecord::new(RecordId(1), "10", "L");
        assert_eq!(record.measure(), None);

        record.set_locate_result(LocateStatus::from_service(LOCATE_OK, Some(4.5)));
        assert_eq!(record.measure(), Some(4.5));
    }

    #[test]
    fn test_non_ok_status_has_no_measure() {
        let status = LocateStatus::from_service("esriLocatingCannotFindRoute", Some(3.0));
        assert_eq!(status, LocateStatus::Miss { code: "esriLocatingCannotFindRoute".into() });

        let mut record = LocationRecord::new(RecordId(1), "10", "L");
        record.set_locate_result(status);
        assert_eq!(record.measure(), None);
        assert_eq!(record.status().code(), "esriLocatingCannotFindRoute");
    }

    #[test]
    fn test_ok_status_without_measure_is_miss() {
        let status = LocateStatus::from_service(LOCATE_OK, None);
        assert!(matches!(status, LocateStatus::Miss { .. }));
    }

    #[test]
    fn test_locate_result_is_write_once() {
        let mut record = LocationRecord::new(RecordId(7), "10", "R");
        assert!(record.set_locate_result(LocateStatus::Located { measure: 1.0 }));
        assert!(!record.set_locate_result(LocateStatus::Located { measure: 2.0 }));
        assert_eq!(record.measure(), Some(1.0));
    }

    #[test]
    fn test_probe_serialization() {
        let record =
            LocationRecord::new(RecordId(3), "RT-5", "L").with_point(Point { x: 10.5, y: -2.0 });
        let json = serde_json::to_value(record.probe()).unwrap();
        assert_eq!(json, serde_json::json!({"routeId": "RT-5", "geometry": {"x": 10.5, "y": -2.0}}));
    }

    #[test]
    fn test_builders_set_identity_and_metadata() {
        let edited = chrono::NaiveDate::from_ymd_opt(2015, 10, 2)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let record = LocationRecord::new(RecordId(9), "10", "L")
            .with_edit_metadata(Some("EV-1".into()), Some("editor".into()), Some(edited))
            .with_attribute("GUARDRAIL_TYPE", Value::from("W-Beam"));

        assert_eq!(record.record_id(), RecordId(9));
        assert_eq!(record.route_id(), "10");
        assert_eq!(record.side(), "L");
        assert_eq!(record.event_id(), Some("EV-1"));
        assert_eq!(record.edit_user(), Some("editor"));
        assert_eq!(record.edit_date(), Some(edited));
        assert_eq!(record.effective_date(), None);
        assert_eq!(record.attributes()["GUARDRAIL_TYPE"], Value::from("W-Beam"));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Straße".as_bytes()), "Straße");
        // "Straße" in Latin-1
        assert_eq!(normalize_text(&[0x53, 0x74, 0x72, 0x61, 0xDF, 0x65]), "Straße");
        assert_eq!(normalize_text(b""), "");
    }
}
