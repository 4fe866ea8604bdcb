//! Hash-chained order history.
//!
//! Every order carries an append-only event list. Each event's hash covers the
//! previous event's hash and its own content, so rewriting or dropping an entry
//! breaks the chain from that point on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::models::{timestamp_now, OrderEvent, OrderEventKind};
use crate::store::EntityStore;

/// Attempts to find a free sequence slot when appends race.
const APPEND_ATTEMPTS: u32 = 3;

/// Hash arbitrary data with SHA-256, hex encoded.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Hashed content of an event (everything but the hashes themselves).
#[derive(Serialize)]
struct EventContent<'a> {
    order_id: &'a str,
    sequence: u32,
    kind: &'a OrderEventKind,
    recorded_at: &'a DateTime<Utc>,
}

/// Compute an event's chained hash.
pub fn event_hash(
    prev_hash: Option<&str>,
    order_id: &str,
    sequence: u32,
    kind: &OrderEventKind,
    recorded_at: &DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let content = serde_json::to_string(&EventContent {
        order_id,
        sequence,
        kind,
        recorded_at,
    })?;
    let combined = format!("{}{}", prev_hash.unwrap_or(""), content);
    Ok(hash_data(combined.as_bytes()))
}

/// Outcome of re-checking an order's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryVerification {
    pub event_count: usize,
    /// Sequence number of the first event whose hash or link does not check out
    pub first_broken: Option<u32>,
}

impl HistoryVerification {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// Order history manager.
pub struct OrderHistory<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> OrderHistory<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Append an event to an order's history.
    pub fn record(&self, order_id: &str, kind: OrderEventKind) -> CoreResult<OrderEvent> {
        for attempt in 1..=APPEND_ATTEMPTS {
            let events = self.store.list_order_events(order_id)?;
            let last = events.last();
            let sequence = last.map_or(1, |e| e.sequence + 1);
            let prev_hash = last.map(|e| e.hash.clone());
            let recorded_at = timestamp_now();

            let hash = event_hash(prev_hash.as_deref(), order_id, sequence, &kind, &recorded_at)
                .map_err(crate::db::DbError::from)?;

            let event = OrderEvent {
                order_id: order_id.to_string(),
                sequence,
                kind: kind.clone(),
                recorded_at,
                prev_hash,
                hash,
            };

            if self.store.append_order_event(&event)? {
                debug!(order_id, sequence, "Order event recorded");
                return Ok(event);
            }
            debug!(order_id, sequence, attempt, "History slot taken, re-reading");
        }

        warn!(order_id, "Could not append order event");
        Err(CoreError::concurrent(EntityKind::Order, order_id))
    }

    /// Append an event for a change that is already stored.
    ///
    /// A failed append is logged and the event skipped; the change stands.
    pub fn record_committed(&self, order_id: &str, kind: OrderEventKind) -> Option<OrderEvent> {
        match self.record(order_id, kind) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(order_id, error = %err, "Order event not recorded after committed change");
                None
            }
        }
    }

    /// An order's events in sequence order.
    pub fn events(&self, order_id: &str) -> CoreResult<Vec<OrderEvent>> {
        Ok(self.store.list_order_events(order_id)?)
    }

    /// Recompute the chain and report the first broken link.
    pub fn verify(&self, order_id: &str) -> CoreResult<HistoryVerification> {
        let events = self.store.list_order_events(order_id)?;
        let mut prev_hash: Option<String> = None;
        let mut first_broken = None;

        for (index, event) in events.iter().enumerate() {
            let expected_hash = event_hash(
                prev_hash.as_deref(),
                &event.order_id,
                event.sequence,
                &event.kind,
                &event.recorded_at,
            )
            .map_err(crate::db::DbError::from)?;

            let linked = event.prev_hash == prev_hash && event.sequence as usize == index + 1;
            if !linked || event.hash != expected_hash {
                first_broken = Some(event.sequence);
                break;
            }
            prev_hash = Some(event.hash.clone());
        }

        if let Some(sequence) = first_broken {
            warn!(order_id, sequence, "Order history chain broken");
        }

        Ok(HistoryVerification {
            event_count: events.len(),
            first_broken,
        })
    }
}
