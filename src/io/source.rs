//! Source feature dataset backed by SQLite
//!
//! Reads pending line features (processed date unset) and writes event ids
//! back inside a scoped edit session. Column names come from configuration.

use crate::domain::geometry::{self, Point};
use crate::domain::location::{normalize_text, LocationRecord, RecordId};
use crate::error::StoreError;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, ValueRef};
use rusqlite::{params, Connection, Transaction};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Column names in the source feature table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceFields {
    pub id: String,
    pub geometry: String,
    pub route_id: String,
    pub event_id: String,
    pub effective_date: String,
    pub edit_user: String,
    pub edit_date: String,
    pub side: String,
    pub processed_date: String,
}

impl Default for SourceFields {
    fn default() -> Self {
        Self {
            id: "OBJECTID".to_string(),
            geometry: "SHAPE".to_string(),
            route_id: "RouteID".to_string(),
            event_id: "EventID".to_string(),
            effective_date: "EffectiveDateOfChange".to_string(),
            edit_user: "last_edited_user".to_string(),
            edit_date: "last_edited_date".to_string(),
            side: "GUARDRAIL_POSITION".to_string(),
            processed_date: "ProcessedDate".to_string(),
        }
    }
}

impl SourceFields {
    pub fn names(&self) -> [&str; 9] {
        [
            self.id.as_str(),
            self.geometry.as_str(),
            self.route_id.as_str(),
            self.event_id.as_str(),
            self.effective_date.as_str(),
            self.edit_user.as_str(),
            self.edit_date.as_str(),
            self.side.as_str(),
            self.processed_date.as_str(),
        ]
    }
}

/// One pending line feature as read from the table
#[derive(Debug, Clone)]
pub struct SourceFeature {
    pub record_id: RecordId,
    /// Leading and trailing vertex; `None` when the shape is empty or unreadable
    pub end_points: Option<(Point, Point)>,
    pub route_id: String,
    pub event_id: Option<String>,
    pub effective_date: Option<NaiveDateTime>,
    pub edit_user: Option<String>,
    pub edit_date: Option<NaiveDateTime>,
    pub side: String,
    pub attributes: BTreeMap<String, Value>,
}

impl SourceFeature {
    /// Two location records, one per end point, sharing the feature's id
    pub fn into_locations(self) -> Vec<LocationRecord> {
        let Some((first, last)) = self.end_points else {
            return Vec::new();
        };

        let leading = LocationRecord::new(self.record_id, self.route_id, self.side)
            .with_point(first)
            .with_effective_date(self.effective_date)
            .with_edit_metadata(self.event_id, self.edit_user, self.edit_date)
            .with_attributes(self.attributes);

        let trailing = leading.clone().with_point(last);
        vec![leading, trailing]
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Text form of a key column; SQLite may hand back numbers for route ids
fn key_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(raw) | ValueRef::Blob(raw) => normalize_text(raw),
    }
}

fn optional_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        other => Some(key_text(other)),
    }
}

/// Date column read without failing the batch: an unparseable value is
/// logged and treated as absent
fn lenient_date(value: ValueRef<'_>, record_id: RecordId, column: &str) -> Option<NaiveDateTime> {
    if let ValueRef::Null = value {
        return None;
    }
    match NaiveDateTime::column_result(value) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(record_id = %record_id, column = %column, error = %e, "feature_date_unreadable");
            None
        }
    }
}

fn attribute_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(raw) | ValueRef::Blob(raw) => Value::String(normalize_text(raw)),
    }
}

#[derive(Debug, Clone)]
struct Statements {
    select_pending: String,
    select_pending_ids: String,
    mark_processed: String,
}

impl Statements {
    fn new(table: &str, fields: &SourceFields, passthrough: &[String]) -> Self {
        let table = quote_ident(table);
        let id = quote_ident(&fields.id);
        let processed = quote_ident(&fields.processed_date);

        let mut columns: Vec<String> = [
            &fields.id,
            &fields.geometry,
            &fields.route_id,
            &fields.event_id,
            &fields.effective_date,
            &fields.edit_user,
            &fields.edit_date,
            &fields.side,
        ]
        .iter()
        .map(|name| quote_ident(name))
        .collect();
        columns.extend(passthrough.iter().map(|name| quote_ident(name)));

        Self {
            select_pending: format!(
                "SELECT {} FROM {table} WHERE {processed} IS NULL ORDER BY {id}",
                columns.join(", ")
            ),
            select_pending_ids: format!(
                "SELECT {id} FROM {table} WHERE {processed} IS NULL ORDER BY {id}"
            ),
            mark_processed: format!(
                "UPDATE {table} SET {} = ?1, {processed} = ?2 WHERE {id} = ?3 AND {processed} IS NULL",
                quote_ident(&fields.event_id)
            ),
        }
    }
}

pub struct FeatureStore {
    conn: Connection,
    table: String,
    fields: SourceFields,
    passthrough: Vec<String>,
    statements: Statements,
}

impl FeatureStore {
    pub fn new(conn: Connection, table: &str, fields: SourceFields, passthrough: Vec<String>) -> Self {
        let statements = Statements::new(table, &fields, &passthrough);
        Self { conn, table: table.to_string(), fields, passthrough, statements }
    }

    pub fn open<P: AsRef<Path>>(
        path: P,
        table: &str,
        fields: SourceFields,
        passthrough: Vec<String>,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        info!(database = %path.as_ref().display(), table = %table, "feature_store_opened");
        Ok(Self::new(conn, table, fields, passthrough))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the feature table with the configured columns if it is missing
    pub fn ensure_table(&self) -> Result<(), StoreError> {
        let f = &self.fields;
        let mut columns = vec![
            format!("{} INTEGER PRIMARY KEY", quote_ident(&f.id)),
            format!("{} TEXT", quote_ident(&f.geometry)),
            format!("{} TEXT", quote_ident(&f.route_id)),
            format!("{} TEXT", quote_ident(&f.event_id)),
            format!("{} TEXT", quote_ident(&f.effective_date)),
            format!("{} TEXT", quote_ident(&f.edit_user)),
            format!("{} TEXT", quote_ident(&f.edit_date)),
            format!("{} TEXT", quote_ident(&f.side)),
            format!("{} TEXT", quote_ident(&f.processed_date)),
        ];
        columns.extend(self.passthrough.iter().map(|name| quote_ident(name)));

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.table),
            columns.join(", ")
        );
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    /// All features whose processed date is unset, ordered by id
    pub fn pending_features(&self) -> Result<Vec<SourceFeature>, StoreError> {
        let mut stmt = self.conn.prepare(&self.statements.select_pending)?;
        let mut rows = stmt.query([])?;
        let mut features = Vec::new();

        while let Some(row) = rows.next()? {
            let record_id = RecordId(row.get(0)?);
            let shape: Option<String> = row.get(1)?;

            let end_points = match shape.as_deref().map(geometry::end_points) {
                Some(Ok(points)) => points,
                Some(Err(e)) => {
                    warn!(record_id = %record_id, error = %e, "feature_geometry_unreadable");
                    None
                }
                None => None,
            };
            if end_points.is_none() {
                debug!(record_id = %record_id, "feature_without_end_points");
            }

            let mut attributes = BTreeMap::new();
            for (offset, name) in self.passthrough.iter().enumerate() {
                attributes.insert(name.clone(), attribute_value(row.get_ref(8 + offset)?));
            }

            features.push(SourceFeature {
                record_id,
                end_points,
                route_id: key_text(row.get_ref(2)?),
                event_id: optional_text(row.get_ref(3)?),
                effective_date: lenient_date(row.get_ref(4)?, record_id, &self.fields.effective_date),
                edit_user: optional_text(row.get_ref(5)?),
                edit_date: lenient_date(row.get_ref(6)?, record_id, &self.fields.edit_date),
                side: key_text(row.get_ref(7)?),
                attributes,
            });
        }

        info!(table = %self.table, pending = %features.len(), "pending_features_loaded");
        Ok(features)
    }

    /// Open a scoped edit session. Dropping it without `commit` rolls back.
    pub fn begin_edit(&mut self) -> Result<EditSession<'_>, StoreError> {
        let tx = self.conn.transaction()?;
        debug!(table = %self.table, "edit_session_started");
        Ok(EditSession { tx: Some(tx), statements: &self.statements, table: &self.table })
    }
}

pub struct EditSession<'a> {
    tx: Option<Transaction<'a>>,
    statements: &'a Statements,
    table: &'a str,
}

impl<'a> EditSession<'a> {
    fn tx(&self) -> Result<&Transaction<'a>, StoreError> {
        self.tx.as_ref().ok_or(StoreError::SessionClosed)
    }

    /// Ids of features still pending, read inside the session
    pub fn pending_ids(&self) -> Result<Vec<RecordId>, StoreError> {
        let tx = self.tx()?;
        let mut stmt = tx.prepare(&self.statements.select_pending_ids)?;
        let ids = stmt
            .query_map([], |row| row.get(0).map(RecordId))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Set the event id and processed date of one pending feature.
    /// Returns the number of rows changed (0 when no longer pending).
    pub fn mark_processed(
        &self,
        record_id: RecordId,
        event_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let tx = self.tx()?;
        let changed =
            tx.execute(&self.statements.mark_processed, params![event_id, processed_at, record_id.0])?;
        Ok(changed)
    }

    pub fn commit(mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::SessionClosed)?;
        tx.commit()?;
        debug!(table = %self.table, "edit_session_committed");
        Ok(())
    }
}

impl Drop for EditSession<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            match tx.rollback() {
                Ok(()) => warn!(table = %self.table, "edit_session_rolled_back"),
                Err(e) => error!(table = %self.table, error = %e, "edit_session_rollback_failed"),
            }
        }
    }
}
