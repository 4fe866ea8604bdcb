//! SQLite-backed entity store.

mod collectors;
mod events;
mod orders;
mod patients;
mod results;
mod schema;
mod services;

pub use schema::*;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::models::{
    Collector, LabOrder, LabService, OrderEvent, Patient, TestResult,
};
use crate::store::{CollectorFilter, EntityStore, OrderFilter};

/// How long a connection waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Fixed-width UTC timestamp, so text order equals time order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Constraint(format!("Invalid timestamp {}: {}", s, e)))
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> DbResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

/// Parse a stored enum value.
pub(crate) fn parse_enum<T: FromStr<Err = String>>(s: &str) -> DbResult<T> {
    s.parse().map_err(DbError::Constraint)
}

impl EntityStore for Database {
    fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        Database::get_patient(self, id)
    }

    fn get_order(&self, id: &str) -> DbResult<Option<LabOrder>> {
        Database::get_order(self, id)
    }

    fn list_orders(&self, filter: &OrderFilter) -> DbResult<Vec<LabOrder>> {
        Database::list_orders(self, filter)
    }

    fn insert_order(&self, order: &LabOrder) -> DbResult<bool> {
        Database::insert_order(self, order)
    }

    fn update_order(&self, order: &LabOrder, expected_version: i64) -> DbResult<bool> {
        Database::update_order(self, order, expected_version)
    }

    fn get_collector(&self, id: &str) -> DbResult<Option<Collector>> {
        Database::get_collector(self, id)
    }

    fn list_collectors(&self, filter: &CollectorFilter) -> DbResult<Vec<Collector>> {
        Database::list_collectors(self, filter)
    }

    fn insert_collector(&self, collector: &Collector) -> DbResult<bool> {
        Database::insert_collector(self, collector)
    }

    fn update_collector(&self, collector: &Collector, expected_version: i64) -> DbResult<bool> {
        Database::update_collector(self, collector, expected_version)
    }

    fn get_result(&self, order_id: &str, service_id: i64) -> DbResult<Option<TestResult>> {
        Database::get_result(self, order_id, service_id)
    }

    fn list_results(&self, order_id: &str) -> DbResult<Vec<TestResult>> {
        Database::list_results(self, order_id)
    }

    fn insert_result(&self, result: &TestResult) -> DbResult<bool> {
        Database::insert_result(self, result)
    }

    fn update_result(&self, result: &TestResult, expected_version: i64) -> DbResult<bool> {
        Database::update_result(self, result, expected_version)
    }

    fn get_service(&self, id: i64) -> DbResult<Option<LabService>> {
        Database::get_service(self, id)
    }

    fn list_services(&self) -> DbResult<Vec<LabService>> {
        Database::list_catalog(self, false)
    }

    fn append_order_event(&self, event: &OrderEvent) -> DbResult<bool> {
        Database::append_order_event(self, event)
    }

    fn list_order_events(&self, order_id: &str) -> DbResult<Vec<OrderEvent>> {
        Database::list_order_events(self, order_id)
    }
}
