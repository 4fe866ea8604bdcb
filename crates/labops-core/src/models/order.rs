//! Lab order models and the order status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp_now;

/// Order status.
///
/// The lifecycle is strictly forward:
/// `registered → collection_scheduled → collected → processing → completed → delivered`.
/// `cancelled` is a terminal state reachable from anything but `delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order registered, no collection booked yet
    Registered,
    /// A collector visit is booked
    CollectionScheduled,
    /// Sample collected from the patient
    Collected,
    /// Sample in the lab
    Processing,
    /// Results signed off
    Completed,
    /// Results delivered to the patient
    Delivered,
    /// Withdrawn before delivery
    Cancelled,
}

/// Allowed transitions, one row per source status.
const ORDER_TRANSITIONS: [(OrderStatus, &[OrderStatus]); 7] = [
    (
        OrderStatus::Registered,
        &[OrderStatus::CollectionScheduled, OrderStatus::Cancelled],
    ),
    (
        OrderStatus::CollectionScheduled,
        &[OrderStatus::Collected, OrderStatus::Cancelled],
    ),
    (
        OrderStatus::Collected,
        &[OrderStatus::Processing, OrderStatus::Cancelled],
    ),
    (
        OrderStatus::Processing,
        &[OrderStatus::Completed, OrderStatus::Cancelled],
    ),
    (
        OrderStatus::Completed,
        &[OrderStatus::Delivered, OrderStatus::Cancelled],
    ),
    (OrderStatus::Delivered, &[]),
    (OrderStatus::Cancelled, &[]),
];

impl OrderStatus {
    /// The six lifecycle statuses in order.
    pub const LIFECYCLE: [OrderStatus; 6] = [
        OrderStatus::Registered,
        OrderStatus::CollectionScheduled,
        OrderStatus::Collected,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Delivered,
    ];

    /// Every status, lifecycle first, then `cancelled`.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Registered,
        OrderStatus::CollectionScheduled,
        OrderStatus::Collected,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Statuses this one may move to.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        ORDER_TRANSITIONS
            .iter()
            .find(|(from, _)| *from == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    /// Check whether `self → target` is an edge of the state machine.
    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Next status in the normal lifecycle (never `cancelled`).
    pub fn next(self) -> Option<OrderStatus> {
        self.allowed_targets()
            .iter()
            .copied()
            .find(|s| *s != OrderStatus::Cancelled)
    }

    /// Position in the lifecycle; `None` for `cancelled`.
    pub fn lifecycle_index(self) -> Option<usize> {
        Self::LIFECYCLE.iter().position(|s| *s == self)
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// An order in this status keeps its collector busy.
    pub fn holds_collector(self) -> bool {
        matches!(self, Self::CollectionScheduled | Self::Collected)
    }

    /// Results may be entered or edited in this status.
    pub fn accepts_results(self) -> bool {
        matches!(self, Self::Collected | Self::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::CollectionScheduled => "collection_scheduled",
            Self::Collected => "collected",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid order status: {s}"))
    }
}

/// Order priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

/// One catalog test attached to an order, priced at order time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderServiceLine {
    /// Catalog service ID
    pub service_id: i64,
    /// Service name at order time (for display/export)
    pub service_name: String,
    /// Quantity ordered
    pub quantity: u32,
    /// Unit price snapshot
    pub price: i64,
}

impl OrderServiceLine {
    pub fn line_total(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }
}

/// A lab order, the central aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabOrder {
    /// Unique order ID
    pub id: String,
    /// Human-readable order number (e.g. `LAB-20240310-0004`)
    pub order_number: String,
    /// Owning patient
    pub patient_id: String,
    /// Assigned collector (weak reference)
    pub collector_id: Option<String>,
    /// Ordered service lines
    pub lines: Vec<OrderServiceLine>,
    /// Sum of line totals, frozen at creation
    pub total_amount: i64,
    /// Booked collection date
    pub scheduled_date: Option<NaiveDate>,
    /// Booked time slot (e.g. "08:00-10:00")
    pub time_slot: Option<String>,
    /// Where the sample is collected
    pub collection_address: String,
    pub priority: Priority,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-lock version, bumped on every write
    pub version: i64,
}

impl LabOrder {
    /// Create a registered order from priced lines.
    pub fn new(
        order_number: String,
        patient_id: String,
        lines: Vec<OrderServiceLine>,
        collection_address: String,
    ) -> Self {
        let now = timestamp_now();
        let total_amount = lines.iter().map(OrderServiceLine::line_total).sum();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order_number,
            patient_id,
            collector_id: None,
            lines,
            total_amount,
            scheduled_date: None,
            time_slot: None,
            collection_address,
            priority: Priority::Normal,
            notes: None,
            status: OrderStatus::Registered,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Check if a service is one of this order's lines.
    pub fn has_service(&self, service_id: i64) -> bool {
        self.lines.iter().any(|line| line.service_id == service_id)
    }

    /// Check if this order keeps `collector_id` busy.
    pub fn holds_collector(&self, collector_id: &str) -> bool {
        self.status.holds_collector() && self.collector_id.as_deref() == Some(collector_id)
    }

    /// Prepare the next revision: bump version and `updated_at`.
    ///
    /// Returns the version the write must be conditioned on.
    pub fn next_revision(&mut self) -> i64 {
        let expected = self.version;
        self.version += 1;
        self.updated_at = timestamp_now();
        expected
    }
}

/// Build a human-readable order number from the creation date and a per-day sequence.
pub fn format_order_number(date: NaiveDate, sequence: u32) -> String {
    format!("LAB-{}-{:04}", date.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(service_id: i64, quantity: u32, price: i64) -> OrderServiceLine {
        OrderServiceLine {
            service_id,
            service_name: format!("Service {}", service_id),
            quantity,
            price,
        }
    }

    #[test]
    fn test_lifecycle_is_a_single_forward_chain() {
        for pair in OrderStatus::LIFECYCLE.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert!(pair[0].can_transition_to(pair[1]));
            assert!(!pair[1].can_transition_to(pair[0]));
        }
        assert_eq!(OrderStatus::Delivered.next(), None);
    }

    #[test]
    fn test_no_skipping() {
        assert!(!OrderStatus::Registered.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Registered.can_transition_to(OrderStatus::Collected));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_cancellation_edges() {
        for status in &OrderStatus::LIFECYCLE[..5] {
            assert!(status.can_transition_to(OrderStatus::Cancelled));
        }
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Completed.is_terminal());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&OrderStatus::CollectionScheduled).unwrap();
        assert_eq!(json, "\"collection_scheduled\"");
    }

    #[test]
    fn test_total_is_line_sum() {
        let order = LabOrder::new(
            "LAB-20240310-0001".into(),
            "patient-1".into(),
            vec![line(1, 1, 150_000), line(2, 2, 150_000)],
            "Tehran".into(),
        );
        assert_eq!(order.total_amount, 450_000);
        assert_eq!(order.status, OrderStatus::Registered);
        assert_eq!(order.version, 1);
        assert!(order.has_service(2));
        assert!(!order.has_service(3));
    }

    #[test]
    fn test_next_revision() {
        let mut order = LabOrder::new("n".into(), "p".into(), vec![], "a".into());
        let expected = order.next_revision();
        assert_eq!(expected, 1);
        assert_eq!(order.version, 2);
    }

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(format_order_number(date, 7), "LAB-20240310-0007");
    }
}
