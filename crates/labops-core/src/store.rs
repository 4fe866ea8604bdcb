//! The entity store boundary.
//!
//! All order, collector and result state lives behind [`EntityStore`]. The
//! core never caches entities between calls: every operation reads, validates,
//! then writes conditioned on the version it read (compare-and-swap). An
//! `update_*` returning `false` means another writer got there first.

use chrono::{DateTime, Utc};

use crate::db::DbResult;
use crate::models::{
    Collector, CollectorStatus, LabOrder, LabService, OrderEvent, OrderStatus, Patient,
    TestResult,
};

/// Data access required by the lifecycle, assignment, result and reporting services.
pub trait EntityStore {
    fn get_patient(&self, id: &str) -> DbResult<Option<Patient>>;

    fn get_order(&self, id: &str) -> DbResult<Option<LabOrder>>;
    fn list_orders(&self, filter: &OrderFilter) -> DbResult<Vec<LabOrder>>;
    /// Insert a new order. `false` if the ID or order number is taken.
    fn insert_order(&self, order: &LabOrder) -> DbResult<bool>;
    /// Write `order` only if the stored version is still `expected_version`.
    fn update_order(&self, order: &LabOrder, expected_version: i64) -> DbResult<bool>;

    fn get_collector(&self, id: &str) -> DbResult<Option<Collector>>;
    fn list_collectors(&self, filter: &CollectorFilter) -> DbResult<Vec<Collector>>;
    fn insert_collector(&self, collector: &Collector) -> DbResult<bool>;
    /// Write `collector` only if the stored version is still `expected_version`.
    fn update_collector(&self, collector: &Collector, expected_version: i64) -> DbResult<bool>;

    fn get_result(&self, order_id: &str, service_id: i64) -> DbResult<Option<TestResult>>;
    fn list_results(&self, order_id: &str) -> DbResult<Vec<TestResult>>;
    /// Insert a new result. `false` if one already exists for the key.
    fn insert_result(&self, result: &TestResult) -> DbResult<bool>;
    /// Write `result` only if the stored version is still `expected_version`.
    fn update_result(&self, result: &TestResult, expected_version: i64) -> DbResult<bool>;

    fn get_service(&self, id: i64) -> DbResult<Option<LabService>>;
    fn list_services(&self) -> DbResult<Vec<LabService>>;

    /// Append to an order's history. `false` if the sequence slot is taken.
    fn append_order_event(&self, event: &OrderEvent) -> DbResult<bool>;
    fn list_order_events(&self, order_id: &str) -> DbResult<Vec<OrderEvent>>;
}

/// Order query filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    /// Any of these statuses (all when empty)
    pub statuses: Vec<OrderStatus>,
    pub collector_id: Option<String>,
    pub patient_id: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub created_to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    /// Orders that keep a collector busy.
    pub fn active_for_collector(collector_id: &str) -> Self {
        Self {
            statuses: OrderStatus::ALL
                .into_iter()
                .filter(|s| s.holds_collector())
                .collect(),
            collector_id: Some(collector_id.to_string()),
            ..Self::default()
        }
    }

    pub fn created_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            created_from: Some(from),
            created_to: Some(to),
            ..Self::default()
        }
    }

    /// Check an order against this filter.
    pub fn matches(&self, order: &LabOrder) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && self
                .collector_id
                .as_ref()
                .map_or(true, |id| order.collector_id.as_ref() == Some(id))
            && self
                .patient_id
                .as_ref()
                .map_or(true, |id| &order.patient_id == id)
            && self.created_from.map_or(true, |from| order.created_at >= from)
            && self.created_to.map_or(true, |to| order.created_at <= to)
    }
}

/// Collector query filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectorFilter {
    pub status: Option<CollectorStatus>,
    /// Only collectors with `is_active`
    pub active_only: bool,
}

impl CollectorFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, collector: &Collector) -> bool {
        self.status.map_or(true, |s| collector.status == s)
            && (!self.active_only || collector.is_active)
    }
}
