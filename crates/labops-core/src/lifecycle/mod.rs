//! Order lifecycle management.
//!
//! Orders move strictly forward through
//! `registered → collection_scheduled → collected → processing → completed → delivered`,
//! one step at a time, or drop out to `cancelled` from anything short of
//! `delivered`. Every write is conditioned on the version that was read, and
//! every status change re-derives the assigned collector's availability.

mod bulk;

pub use bulk::{BulkDeliveryItem, BulkDeliveryReport, DeliveryOutcome};

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::audit::{HistoryVerification, OrderHistory};
use crate::collectors::{CollectorTracker, DEFAULT_SYNC_ATTEMPTS};
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::models::{
    format_order_number, LabOrder, OrderEvent, OrderEventKind, OrderServiceLine, OrderStatus,
    Priority,
};
use crate::store::{EntityStore, OrderFilter};

/// Attempts at claiming a free order number when registrations race.
const ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// One requested service on a new order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub service_id: i64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn single(service_id: i64) -> Self {
        Self {
            service_id,
            quantity: 1,
        }
    }
}

/// Input for registering an order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewOrder {
    pub patient_id: String,
    pub items: Vec<OrderItem>,
    /// Defaults to the patient's address
    pub collection_address: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub priority: Priority,
    pub notes: Option<String>,
}

/// Order lifecycle manager.
pub struct OrderLifecycle<'a, S: EntityStore> {
    store: &'a S,
    history: OrderHistory<'a, S>,
    collectors: CollectorTracker<'a, S>,
}

impl<'a, S: EntityStore> OrderLifecycle<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_sync_attempts(store, DEFAULT_SYNC_ATTEMPTS)
    }

    pub fn with_sync_attempts(store: &'a S, sync_attempts: u32) -> Self {
        Self {
            store,
            history: OrderHistory::new(store),
            collectors: CollectorTracker::with_sync_attempts(store, sync_attempts),
        }
    }

    /// Register a new order, pricing each line from the catalog.
    pub fn register_order(&self, new_order: NewOrder) -> CoreResult<LabOrder> {
        let patient = self
            .store
            .get_patient(&new_order.patient_id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Patient, new_order.patient_id.as_str()))?;

        let lines = self.price_lines(&new_order.items)?;
        let collection_address = new_order
            .collection_address
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(patient.address);

        for attempt in 0..ORDER_NUMBER_ATTEMPTS {
            let mut order = LabOrder::new(
                String::new(),
                new_order.patient_id.clone(),
                lines.clone(),
                collection_address.clone(),
            );
            order.scheduled_date = new_order.scheduled_date;
            order.time_slot = new_order.time_slot.clone();
            order.priority = new_order.priority;
            order.notes = new_order.notes.clone();

            let day = order.created_at.date_naive();
            let sequence = self.next_order_sequence(day)? + attempt;
            order.order_number = format_order_number(day, sequence);

            if self.store.insert_order(&order)? {
                self.history.record_committed(
                    &order.id,
                    OrderEventKind::Created {
                        order_number: order.order_number.clone(),
                        total_amount: order.total_amount,
                    },
                );
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total_amount = order.total_amount,
                    lines = order.lines.len(),
                    "Order registered"
                );
                return Ok(order);
            }
            debug!(order_number = %order.order_number, attempt, "Order number taken, retrying");
        }

        warn!(patient_id = %new_order.patient_id, "Could not allocate an order number");
        Err(CoreError::concurrent(EntityKind::Order, new_order.patient_id))
    }

    pub fn get_order(&self, order_id: &str) -> CoreResult<LabOrder> {
        self.store
            .get_order(order_id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Order, order_id))
    }

    pub fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<LabOrder>> {
        Ok(self.store.list_orders(filter)?)
    }

    /// Move an order to `target`.
    ///
    /// Requesting the status the order already has succeeds without writing.
    /// Otherwise `target` must be an edge of the state machine from the current
    /// status, and the write fails with `ConcurrentModification` if the order
    /// changed since it was read.
    pub fn transition(&self, order_id: &str, target: OrderStatus) -> CoreResult<LabOrder> {
        let mut order = self.get_order(order_id)?;

        if order.status == target {
            debug!(order_id, status = %target, "Order already in target status");
            // Heal any drift left by an interrupted earlier attempt.
            if let Some(collector_id) = order.collector_id.as_deref() {
                self.collectors.sync_collector(collector_id)?;
            }
            return Ok(order);
        }

        let from = order.status;
        if !from.can_transition_to(target) {
            return Err(CoreError::InvalidTransition {
                order_id: order_id.to_string(),
                from,
                to: target,
            });
        }

        order.status = target;
        let expected = order.next_revision();
        if !self.store.update_order(&order, expected)? {
            warn!(order_id, from = %from, to = %target, "Order changed during transition");
            return Err(CoreError::concurrent(EntityKind::Order, order_id));
        }

        if let Some(collector_id) = order.collector_id.as_deref() {
            self.collectors.sync_collector(collector_id)?;
        }

        self.history
            .record_committed(order_id, OrderEventKind::StatusChanged { from, to: target });

        info!(order_id, order_number = %order.order_number, from = %from, to = %target, "Order status changed");
        Ok(order)
    }

    /// Move an order one step along the lifecycle.
    pub fn advance(&self, order_id: &str) -> CoreResult<LabOrder> {
        let order = self.get_order(order_id)?;
        match order.status.next() {
            Some(next) => self.transition(order_id, next),
            None => Err(CoreError::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                to: order.status,
            }),
        }
    }

    /// Cancel an order. Allowed from any status except `delivered`.
    pub fn cancel(&self, order_id: &str) -> CoreResult<LabOrder> {
        self.transition(order_id, OrderStatus::Cancelled)
    }

    /// An order's recorded history, oldest first.
    pub fn history(&self, order_id: &str) -> CoreResult<Vec<OrderEvent>> {
        self.get_order(order_id)?;
        self.history.events(order_id)
    }

    /// Re-check an order's hash-chained history.
    pub fn verify_history(&self, order_id: &str) -> CoreResult<HistoryVerification> {
        self.get_order(order_id)?;
        self.history.verify(order_id)
    }

    fn price_lines(&self, items: &[OrderItem]) -> CoreResult<Vec<OrderServiceLine>> {
        if items.is_empty() {
            return Err(CoreError::Validation(
                "an order needs at least one service".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity == 0 {
                return Err(CoreError::Validation(format!(
                    "quantity for service {} must be at least 1",
                    item.service_id
                )));
            }
            if !seen.insert(item.service_id) {
                return Err(CoreError::Validation(format!(
                    "service {} appears more than once",
                    item.service_id
                )));
            }

            let service = self
                .store
                .get_service(item.service_id)?
                .ok_or_else(|| CoreError::not_found(EntityKind::Service, item.service_id.to_string()))?;
            if !service.active {
                return Err(CoreError::Validation(format!(
                    "service {} ({}) is no longer offered",
                    service.id, service.code
                )));
            }

            lines.push(OrderServiceLine {
                service_id: service.id,
                service_name: service.name,
                quantity: item.quantity,
                price: service.price,
            });
        }
        Ok(lines)
    }

    /// Next free per-day sequence number for `day`.
    fn next_order_sequence(&self, day: NaiveDate) -> CoreResult<u32> {
        let (start, end) = day_bounds(day);
        let orders = self
            .store
            .list_orders(&OrderFilter::created_between(start, end))?;
        let highest = orders
            .iter()
            .filter_map(|o| o.order_number.rsplit('-').next()?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }
}

/// First and last representable instant of a UTC calendar day.
fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1) - Duration::microseconds(1))
}
