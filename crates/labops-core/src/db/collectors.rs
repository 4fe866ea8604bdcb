//! Collector database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, parse_enum, parse_opt_ts, parse_ts, Database, DbError, DbResult};
use crate::models::{Collector, GeoPoint};
use crate::store::CollectorFilter;

const COLLECTOR_COLUMNS: &str = "id, name, phone, status, is_active, lat, lng, \
     location_updated_at, created_at, updated_at, version";

impl Database {
    /// Insert a new collector. Returns `false` if the ID already exists.
    pub fn insert_collector(&self, collector: &Collector) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            INSERT INTO collectors (
                id, name, phone, status, is_active, lat, lng,
                location_updated_at, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT DO NOTHING
            "#,
            params![
                collector.id,
                collector.name,
                collector.phone,
                collector.status.as_str(),
                collector.is_active,
                collector.location.map(|p| p.lat),
                collector.location.map(|p| p.lng),
                collector.location_updated_at.as_ref().map(format_ts),
                format_ts(&collector.created_at),
                format_ts(&collector.updated_at),
                collector.version,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Compare-and-swap update of a collector.
    pub fn update_collector(&self, collector: &Collector, expected_version: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE collectors SET
                name = ?3,
                phone = ?4,
                status = ?5,
                is_active = ?6,
                lat = ?7,
                lng = ?8,
                location_updated_at = ?9,
                updated_at = ?10,
                version = ?11
            WHERE id = ?1 AND version = ?2
            "#,
            params![
                collector.id,
                expected_version,
                collector.name,
                collector.phone,
                collector.status.as_str(),
                collector.is_active,
                collector.location.map(|p| p.lat),
                collector.location.map(|p| p.lng),
                collector.location_updated_at.as_ref().map(format_ts),
                format_ts(&collector.updated_at),
                collector.version,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a collector by ID.
    pub fn get_collector(&self, id: &str) -> DbResult<Option<Collector>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM collectors WHERE id = ?", COLLECTOR_COLUMNS),
                [id],
                CollectorRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List collectors matching a filter, ordered by name.
    pub fn list_collectors(&self, filter: &CollectorFilter) -> DbResult<Vec<Collector>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM collectors
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 = 0 OR is_active = 1)
            ORDER BY name, id
            "#,
            COLLECTOR_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![filter.status.map(|s| s.as_str()), filter.active_only],
            CollectorRow::from_row,
        )?;

        let mut collectors = Vec::new();
        for row in rows {
            collectors.push(row?.try_into()?);
        }
        Ok(collectors)
    }
}

/// Intermediate row struct for database mapping.
struct CollectorRow {
    id: String,
    name: String,
    phone: String,
    status: String,
    is_active: bool,
    lat: Option<f64>,
    lng: Option<f64>,
    location_updated_at: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl CollectorRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            status: row.get(3)?,
            is_active: row.get(4)?,
            lat: row.get(5)?,
            lng: row.get(6)?,
            location_updated_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            version: row.get(10)?,
        })
    }
}

impl TryFrom<CollectorRow> for Collector {
    type Error = DbError;

    fn try_from(row: CollectorRow) -> Result<Self, Self::Error> {
        let location = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };

        Ok(Collector {
            id: row.id,
            name: row.name,
            phone: row.phone,
            status: parse_enum(&row.status)?,
            is_active: row.is_active,
            location,
            location_updated_at: parse_opt_ts(row.location_updated_at)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            version: row.version,
        })
    }
}
