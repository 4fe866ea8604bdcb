//! Bulk delivery.
//!
//! Each order is handled on its own: ineligible orders are skipped, failures
//! are reported per order, and nothing in the batch is rolled back.

use tracing::{info, warn};

use super::OrderLifecycle;
use crate::error::CoreError;
use crate::models::{LabOrder, OrderStatus};
use crate::store::EntityStore;

/// What happened to one order of a bulk delivery.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Moved from `completed` to `delivered`
    Delivered(LabOrder),
    /// Was already `delivered`; nothing written
    AlreadyDelivered,
    /// Not eligible (status other than `completed`)
    Skipped { status: OrderStatus },
    /// Lookup or write failed
    Failed(CoreError),
}

#[derive(Debug)]
pub struct BulkDeliveryItem {
    pub order_id: String,
    pub outcome: DeliveryOutcome,
}

/// Per-order results of a bulk delivery, in request order.
#[derive(Debug, Default)]
pub struct BulkDeliveryReport {
    pub items: Vec<BulkDeliveryItem>,
}

impl BulkDeliveryReport {
    pub fn delivered_count(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Delivered(_)))
    }

    pub fn already_delivered_count(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::AlreadyDelivered))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, DeliveryOutcome::Failed(_)))
    }

    pub fn outcome(&self, order_id: &str) -> Option<&DeliveryOutcome> {
        self.items
            .iter()
            .find(|item| item.order_id == order_id)
            .map(|item| &item.outcome)
    }

    fn count(&self, pred: impl Fn(&DeliveryOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}

impl<'a, S: EntityStore> OrderLifecycle<'a, S> {
    /// Deliver every `completed` order in `order_ids`.
    ///
    /// Running the same batch again only yields `AlreadyDelivered` for the
    /// orders delivered the first time.
    pub fn bulk_deliver(&self, order_ids: &[String]) -> BulkDeliveryReport {
        let items = order_ids
            .iter()
            .map(|order_id| BulkDeliveryItem {
                order_id: order_id.clone(),
                outcome: self.deliver_one(order_id),
            })
            .collect();
        let report = BulkDeliveryReport { items };

        info!(
            requested = order_ids.len(),
            delivered = report.delivered_count(),
            already_delivered = report.already_delivered_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "Bulk delivery finished"
        );
        report
    }

    fn deliver_one(&self, order_id: &str) -> DeliveryOutcome {
        let order = match self.get_order(order_id) {
            Ok(order) => order,
            Err(err) => return DeliveryOutcome::Failed(err),
        };

        match order.status {
            OrderStatus::Delivered => DeliveryOutcome::AlreadyDelivered,
            OrderStatus::Completed => match self.transition(order_id, OrderStatus::Delivered) {
                Ok(order) => DeliveryOutcome::Delivered(order),
                Err(err) => {
                    warn!(order_id, error = %err, "Bulk delivery failed for order");
                    DeliveryOutcome::Failed(err)
                }
            },
            status => DeliveryOutcome::Skipped { status },
        }
    }
}
