//! Shared fixtures for integration tests: SQLite feature tables and fake LRS services

#![allow(dead_code)]

use async_trait::async_trait;
use lrs_events::domain::event::EventGroup;
use lrs_events::domain::location::{LocateStatus, Probe};
use lrs_events::error::{LocateError, SubmitError, TransportError};
use lrs_events::io::{EditService, FeatureStore, Journal, LocateService, SourceFields};
use rusqlite::params;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TABLE: &str = "GuardRails";

pub fn passthrough() -> Vec<String> {
    vec!["GUARDRAIL_END_TYPE".to_string(), "GUARDRAIL_TYPE".to_string()]
}

/// Feature table in a temporary SQLite file plus a journal path beside it
pub struct Fixture {
    pub store: FeatureStore,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::open(
            dir.path().join("features.sqlite"),
            TABLE,
            SourceFields::default(),
            passthrough(),
        )
        .unwrap();
        store.ensure_table().unwrap();
        Self { store, dir }
    }

    pub fn journal_path(&self) -> String {
        self.dir.path().join("submitted.jsonl").to_str().unwrap().to_string()
    }

    pub fn journal(&self) -> Journal {
        Journal::new(&self.journal_path())
    }

    /// Insert a two-vertex line from (x1, y) to (x2, y)
    pub fn insert_line(&self, id: i64, route: &str, side: &str, x1: f64, x2: f64) {
        let shape = format!(r#"{{"paths":[[[{x1},100.0],[{x2},100.0]]]}}"#);
        self.store
            .connection()
            .execute(
                "INSERT INTO GuardRails (OBJECTID, SHAPE, RouteID, GUARDRAIL_POSITION,
                    EffectiveDateOfChange, last_edited_user, last_edited_date,
                    GUARDRAIL_END_TYPE, GUARDRAIL_TYPE)
                 VALUES (?1, ?2, ?3, ?4, '2015-10-01 00:00:00', 'editor',
                    '2015-10-02 08:30:00', 'Flared', 'W-Beam')",
                params![id, shape, route, side],
            )
            .unwrap();
    }

    pub fn processed_ids(&self) -> Vec<i64> {
        let mut stmt = self
            .store
            .connection()
            .prepare("SELECT OBJECTID FROM GuardRails WHERE ProcessedDate IS NOT NULL ORDER BY OBJECTID")
            .unwrap();
        stmt.query_map([], |row| row.get(0)).unwrap().map(Result::unwrap).collect()
    }

    pub fn event_id_of(&self, id: i64) -> Option<String> {
        self.store
            .connection()
            .query_row("SELECT EventID FROM GuardRails WHERE OBJECTID = ?1", params![id], |row| {
                row.get(0)
            })
            .unwrap()
    }

    /// Make every UPDATE of the given feature abort
    pub fn fail_updates_of(&self, id: i64) {
        self.store
            .connection()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_update BEFORE UPDATE ON GuardRails
                 WHEN OLD.OBJECTID = {id}
                 BEGIN SELECT RAISE(ABORT, 'feature is locked'); END;"
            ))
            .unwrap();
    }
}

pub fn journal_lines(path: &str) -> Vec<serde_json::Value> {
    if !Path::new(path).exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Locates every probe at measure = x; negative x or an empty route misses
#[derive(Clone, Default)]
pub struct FakeLocate {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl FakeLocate {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocateService for FakeLocate {
    async fn locate(&self, probes: &[Probe]) -> Result<Vec<LocateStatus>, LocateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LocateError::Transport(TransportError::Status {
                status: 502,
                body: "Bad Gateway".to_string(),
            }));
        }

        Ok(probes
            .iter()
            .map(|probe| {
                if probe.geometry.x >= 0.0 && !probe.route_id.is_empty() {
                    LocateStatus::Located { measure: probe.geometry.x }
                } else {
                    LocateStatus::Miss { code: "esriLocatingCannotFindLocation".to_string() }
                }
            })
            .collect())
    }
}

/// Submitted span as (route, side, from, to)
pub type Span = (String, String, f64, f64);

pub fn span(route: &str, side: &str, from: f64, to: f64) -> Span {
    (route.to_string(), side.to_string(), from, to)
}

#[derive(Clone, Default)]
pub struct FakeEdits {
    pub submitted: Arc<Mutex<Vec<Span>>>,
    pub calls: Arc<AtomicUsize>,
    pub reject: bool,
}

impl FakeEdits {
    pub fn rejecting() -> Self {
        Self { reject: true, ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn spans(&self) -> Vec<Span> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl EditService for FakeEdits {
    async fn submit(&self, groups: &[EventGroup]) -> Result<(), SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(SubmitError::Rejected { body: r#"{"success":false}"#.to_string() });
        }

        let mut submitted = self.submitted.lock().unwrap();
        for group in groups {
            submitted.push(span(group.route_id(), group.side(), group.from_measure, group.to_measure));
        }
        Ok(())
    }
}
