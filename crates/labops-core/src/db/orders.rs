//! Lab order database operations.

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{format_ts, parse_enum, parse_ts, Database, DbError, DbResult};
use crate::models::{LabOrder, OrderServiceLine};
use crate::store::OrderFilter;

const ORDER_COLUMNS: &str = "id, order_number, patient_id, collector_id, lines, total_amount, \
     scheduled_date, time_slot, collection_address, priority, notes, status, \
     created_at, updated_at, version";

const DATE_FORMAT: &str = "%Y-%m-%d";

impl Database {
    /// Insert a new order. Returns `false` if the ID or order number already exists.
    pub fn insert_order(&self, order: &LabOrder) -> DbResult<bool> {
        let lines_json = serde_json::to_string(&order.lines)?;

        let rows_affected = self.conn.execute(
            r#"
            INSERT INTO lab_orders (
                id, order_number, patient_id, collector_id, lines, total_amount,
                scheduled_date, time_slot, collection_address, priority, notes,
                status, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT DO NOTHING
            "#,
            params![
                order.id,
                order.order_number,
                order.patient_id,
                order.collector_id,
                lines_json,
                order.total_amount,
                order
                    .scheduled_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                order.time_slot,
                order.collection_address,
                order.priority.as_str(),
                order.notes,
                order.status.as_str(),
                format_ts(&order.created_at),
                format_ts(&order.updated_at),
                order.version,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Compare-and-swap update of an order's mutable fields.
    ///
    /// Lines, total and creation time are never rewritten.
    pub fn update_order(&self, order: &LabOrder, expected_version: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE lab_orders SET
                collector_id = ?3,
                scheduled_date = ?4,
                time_slot = ?5,
                collection_address = ?6,
                priority = ?7,
                notes = ?8,
                status = ?9,
                updated_at = ?10,
                version = ?11
            WHERE id = ?1 AND version = ?2
            "#,
            params![
                order.id,
                expected_version,
                order.collector_id,
                order
                    .scheduled_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                order.time_slot,
                order.collection_address,
                order.priority.as_str(),
                order.notes,
                order.status.as_str(),
                format_ts(&order.updated_at),
                order.version,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an order by ID.
    pub fn get_order(&self, id: &str) -> DbResult<Option<LabOrder>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM lab_orders WHERE id = ?", ORDER_COLUMNS),
                [id],
                OrderRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get an order by its human-readable number.
    pub fn get_order_by_number(&self, order_number: &str) -> DbResult<Option<LabOrder>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM lab_orders WHERE order_number = ?",
                    ORDER_COLUMNS
                ),
                [order_number],
                OrderRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List orders matching a filter, oldest first.
    pub fn list_orders(&self, filter: &OrderFilter) -> DbResult<Vec<LabOrder>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if !filter.statuses.is_empty() {
            let placeholders = vec!["?"; filter.statuses.len()].join(", ");
            clauses.push(format!("status IN ({})", placeholders));
            args.extend(filter.statuses.iter().map(|s| s.as_str().to_string()));
        }
        if let Some(collector_id) = &filter.collector_id {
            clauses.push("collector_id = ?".into());
            args.push(collector_id.clone());
        }
        if let Some(patient_id) = &filter.patient_id {
            clauses.push("patient_id = ?".into());
            args.push(patient_id.clone());
        }
        if let Some(from) = &filter.created_from {
            clauses.push("created_at >= ?".into());
            args.push(format_ts(from));
        }
        if let Some(to) = &filter.created_to {
            clauses.push("created_at <= ?".into());
            args.push(format_ts(to));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM lab_orders {} ORDER BY created_at, order_number",
            ORDER_COLUMNS, where_clause
        ))?;

        let rows = stmt.query_map(params_from_iter(args.iter()), OrderRow::from_row)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?.try_into()?);
        }
        Ok(orders)
    }
}

/// Intermediate row struct for database mapping.
struct OrderRow {
    id: String,
    order_number: String,
    patient_id: String,
    collector_id: Option<String>,
    lines: String,
    total_amount: i64,
    scheduled_date: Option<String>,
    time_slot: Option<String>,
    collection_address: String,
    priority: String,
    notes: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl OrderRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_number: row.get(1)?,
            patient_id: row.get(2)?,
            collector_id: row.get(3)?,
            lines: row.get(4)?,
            total_amount: row.get(5)?,
            scheduled_date: row.get(6)?,
            time_slot: row.get(7)?,
            collection_address: row.get(8)?,
            priority: row.get(9)?,
            notes: row.get(10)?,
            status: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
            version: row.get(14)?,
        })
    }
}

impl TryFrom<OrderRow> for LabOrder {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let lines: Vec<OrderServiceLine> = serde_json::from_str(&row.lines)?;
        let scheduled_date = row
            .scheduled_date
            .as_deref()
            .map(|s| {
                NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .map_err(|e| DbError::Constraint(format!("Invalid date {}: {}", s, e)))
            })
            .transpose()?;

        Ok(LabOrder {
            id: row.id,
            order_number: row.order_number,
            patient_id: row.patient_id,
            collector_id: row.collector_id,
            lines,
            total_amount: row.total_amount,
            scheduled_date,
            time_slot: row.time_slot,
            collection_address: row.collection_address,
            priority: parse_enum(&row.priority)?,
            notes: row.notes,
            status: parse_enum(&row.status)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            version: row.version,
        })
    }
}
