//! Order history events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// What happened to an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEventKind {
    Created { order_number: String, total_amount: i64 },
    StatusChanged { from: OrderStatus, to: OrderStatus },
    CollectorAssigned { collector_id: String },
    CollectorReleased { collector_id: String },
}

/// One entry in an order's append-only, hash-chained history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderEvent {
    pub order_id: String,
    /// Position in the order's history, starting at 1
    pub sequence: u32,
    pub kind: OrderEventKind,
    pub recorded_at: DateTime<Utc>,
    /// Hash of the previous event (`None` for the first)
    pub prev_hash: Option<String>,
    /// SHA-256 over `prev_hash` and this event's content
    pub hash: String,
}
