//! Order history database operations.

use rusqlite::{params, Row};

use super::{format_ts, parse_ts, Database, DbError, DbResult};
use crate::models::{OrderEvent, OrderEventKind};

impl Database {
    /// Append an event. Returns `false` if the sequence slot is already taken.
    pub fn append_order_event(&self, event: &OrderEvent) -> DbResult<bool> {
        let kind_json = serde_json::to_string(&event.kind)?;

        let rows_affected = self.conn.execute(
            r#"
            INSERT INTO order_events (order_id, sequence, kind, recorded_at, prev_hash, hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT DO NOTHING
            "#,
            params![
                event.order_id,
                event.sequence,
                kind_json,
                format_ts(&event.recorded_at),
                event.prev_hash,
                event.hash,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// List an order's history in sequence order.
    pub fn list_order_events(&self, order_id: &str) -> DbResult<Vec<OrderEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT order_id, sequence, kind, recorded_at, prev_hash, hash
            FROM order_events
            WHERE order_id = ?
            ORDER BY sequence
            "#,
        )?;

        let rows = stmt.query_map([order_id], EventRow::from_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?.try_into()?);
        }
        Ok(events)
    }
}

/// Intermediate row struct for database mapping.
struct EventRow {
    order_id: String,
    sequence: u32,
    kind: String,
    recorded_at: String,
    prev_hash: Option<String>,
    hash: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            order_id: row.get(0)?,
            sequence: row.get(1)?,
            kind: row.get(2)?,
            recorded_at: row.get(3)?,
            prev_hash: row.get(4)?,
            hash: row.get(5)?,
        })
    }
}

impl TryFrom<EventRow> for OrderEvent {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind: OrderEventKind = serde_json::from_str(&row.kind)?;
        Ok(OrderEvent {
            order_id: row.order_id,
            sequence: row.sequence,
            kind,
            recorded_at: parse_ts(&row.recorded_at)?,
            prev_hash: row.prev_hash,
            hash: row.hash,
        })
    }
}
