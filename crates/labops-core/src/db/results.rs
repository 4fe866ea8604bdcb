//! Test result database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_ts, parse_enum, parse_ts, Database, DbError, DbResult};
use crate::models::TestResult;

const RESULT_COLUMNS: &str = "id, order_id, service_id, value, normal_range, unit, status, \
     notes, created_at, updated_at, version";

impl Database {
    /// Insert a result. Returns `false` if one already exists for `(order_id, service_id)`.
    pub fn insert_result(&self, result: &TestResult) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            INSERT INTO test_results (
                id, order_id, service_id, value, normal_range, unit, status,
                notes, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT DO NOTHING
            "#,
            params![
                result.id,
                result.order_id,
                result.service_id,
                result.value,
                result.normal_range,
                result.unit,
                result.status.as_str(),
                result.notes,
                format_ts(&result.created_at),
                format_ts(&result.updated_at),
                result.version,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Compare-and-swap update of a result, in place.
    pub fn update_result(&self, result: &TestResult, expected_version: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE test_results SET
                value = ?3,
                normal_range = ?4,
                unit = ?5,
                status = ?6,
                notes = ?7,
                updated_at = ?8,
                version = ?9
            WHERE id = ?1 AND version = ?2
            "#,
            params![
                result.id,
                expected_version,
                result.value,
                result.normal_range,
                result.unit,
                result.status.as_str(),
                result.notes,
                format_ts(&result.updated_at),
                result.version,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get the result for one service line of an order.
    pub fn get_result(&self, order_id: &str, service_id: i64) -> DbResult<Option<TestResult>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM test_results WHERE order_id = ?1 AND service_id = ?2",
                    RESULT_COLUMNS
                ),
                params![order_id, service_id],
                ResultRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all results of an order by service ID.
    pub fn list_results(&self, order_id: &str) -> DbResult<Vec<TestResult>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM test_results WHERE order_id = ? ORDER BY service_id",
            RESULT_COLUMNS
        ))?;

        let rows = stmt.query_map([order_id], ResultRow::from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.try_into()?);
        }
        Ok(results)
    }
}

/// Intermediate row struct for database mapping.
struct ResultRow {
    id: String,
    order_id: String,
    service_id: i64,
    value: String,
    normal_range: Option<String>,
    unit: Option<String>,
    status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_id: row.get(1)?,
            service_id: row.get(2)?,
            value: row.get(3)?,
            normal_range: row.get(4)?,
            unit: row.get(5)?,
            status: row.get(6)?,
            notes: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            version: row.get(10)?,
        })
    }
}

impl TryFrom<ResultRow> for TestResult {
    type Error = DbError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        Ok(TestResult {
            id: row.id,
            order_id: row.order_id,
            service_id: row.service_id,
            value: row.value,
            normal_range: row.normal_range,
            unit: row.unit,
            status: parse_enum(&row.status)?,
            notes: row.notes,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            version: row.version,
        })
    }
}
