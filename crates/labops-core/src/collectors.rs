//! Collector assignment tracking.
//!
//! A collector is `busy` exactly when it holds at least one order in
//! `collection_scheduled` or `collected`. That status is never trusted as
//! independent state: every operation that touches either side re-derives it
//! from the collector's active orders via [`CollectorTracker::sync_collector`].

use tracing::{debug, info, warn};

use crate::audit::OrderHistory;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::models::{
    Collector, CollectorStatus, GeoPoint, LabOrder, OrderEventKind, OrderStatus,
};
use crate::store::{CollectorFilter, EntityStore, OrderFilter};

/// Default compare-and-swap attempts for [`CollectorTracker::sync_collector`].
pub const DEFAULT_SYNC_ATTEMPTS: u32 = 5;

/// Status a collector must have given whether it holds active orders.
///
/// Holding work forces `busy`; a `busy` collector with none falls back to
/// `available`; `available` and `offline` are otherwise left alone.
pub fn derived_status(current: CollectorStatus, has_active_orders: bool) -> CollectorStatus {
    if has_active_orders {
        CollectorStatus::Busy
    } else if current == CollectorStatus::Busy {
        CollectorStatus::Available
    } else {
        current
    }
}

/// Collector assignment tracker.
pub struct CollectorTracker<'a, S: EntityStore> {
    store: &'a S,
    history: OrderHistory<'a, S>,
    sync_attempts: u32,
}

impl<'a, S: EntityStore> CollectorTracker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_sync_attempts(store, DEFAULT_SYNC_ATTEMPTS)
    }

    pub fn with_sync_attempts(store: &'a S, sync_attempts: u32) -> Self {
        Self {
            store,
            history: OrderHistory::new(store),
            sync_attempts: sync_attempts.max(1),
        }
    }

    /// Register a new, available collector.
    pub fn register_collector(&self, name: String, phone: String) -> CoreResult<Collector> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("collector name is required".into()));
        }
        let collector = Collector::new(name, phone);
        if !self.store.insert_collector(&collector)? {
            return Err(CoreError::Validation(format!(
                "collector {} already exists",
                collector.id
            )));
        }
        info!(collector_id = %collector.id, name = %collector.name, "Collector registered");
        Ok(collector)
    }

    pub fn get_collector(&self, collector_id: &str) -> CoreResult<Collector> {
        self.store
            .get_collector(collector_id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Collector, collector_id))
    }

    pub fn list_collectors(&self, filter: &CollectorFilter) -> CoreResult<Vec<Collector>> {
        Ok(self.store.list_collectors(filter)?)
    }

    /// Orders currently keeping this collector busy.
    pub fn active_orders(&self, collector_id: &str) -> CoreResult<Vec<LabOrder>> {
        let filter = OrderFilter::active_for_collector(collector_id);
        let orders = self.store.list_orders(&filter)?;
        // Re-check in case the store applies the filter loosely.
        Ok(orders.into_iter().filter(|o| filter.matches(o)).collect())
    }

    /// Assign a collector to an order.
    ///
    /// The order must be `registered` (it moves to `collection_scheduled`) or
    /// already `collection_scheduled` without a collector (re-attach after a
    /// release). The collector must be active and `available`; it becomes `busy`.
    pub fn assign_order(&self, order_id: &str, collector_id: &str) -> CoreResult<LabOrder> {
        let mut order = self
            .store
            .get_order(order_id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Order, order_id))?;

        if order.holds_collector(collector_id) && order.status == OrderStatus::CollectionScheduled {
            debug!(order_id, collector_id, "Order already assigned to this collector");
            return Ok(order);
        }

        let advances = match order.status {
            OrderStatus::Registered => true,
            OrderStatus::CollectionScheduled if order.collector_id.is_none() => false,
            from => {
                return Err(CoreError::InvalidTransition {
                    order_id: order_id.to_string(),
                    from,
                    to: OrderStatus::CollectionScheduled,
                })
            }
        };

        let mut collector = self.get_collector(collector_id)?;
        if !collector.is_active {
            return Err(CoreError::Validation(format!(
                "collector {} is inactive",
                collector_id
            )));
        }
        match collector.status {
            CollectorStatus::Available => {}
            CollectorStatus::Busy => {
                return Err(CoreError::ConflictingActiveAssignment {
                    collector_id: collector_id.to_string(),
                    active_orders: self.active_order_ids(collector_id)?,
                })
            }
            CollectorStatus::Offline => {
                return Err(CoreError::Validation(format!(
                    "collector {} is offline",
                    collector_id
                )))
            }
        }

        // Claim the collector first so two orders cannot both take it.
        collector.status = CollectorStatus::Busy;
        let expected = collector.next_revision();
        if !self.store.update_collector(&collector, expected)? {
            warn!(order_id, collector_id, "Collector changed during assignment");
            return Err(CoreError::concurrent(EntityKind::Collector, collector_id));
        }

        let from = order.status;
        order.collector_id = Some(collector_id.to_string());
        order.status = OrderStatus::CollectionScheduled;
        let expected = order.next_revision();
        if !self.store.update_order(&order, expected)? {
            warn!(order_id, collector_id, "Order changed during assignment, releasing collector");
            self.sync_collector(collector_id)?;
            return Err(CoreError::concurrent(EntityKind::Order, order_id));
        }

        // Another order's transition may have re-derived the collector between
        // the claim and the attach.
        self.sync_collector(collector_id)?;

        if advances {
            self.history.record_committed(
                order_id,
                OrderEventKind::StatusChanged {
                    from,
                    to: OrderStatus::CollectionScheduled,
                },
            );
        }
        self.history.record_committed(
            order_id,
            OrderEventKind::CollectorAssigned {
                collector_id: collector_id.to_string(),
            },
        );

        info!(order_id, collector_id, order_number = %order.order_number, "Collector assigned");
        Ok(order)
    }

    /// Set a collector's availability by hand.
    ///
    /// `busy` only confirms an existing assignment. Moving to `available` or
    /// `offline` while holding active orders is refused unless `force_release`,
    /// which detaches the collector from those orders first.
    pub fn set_collector_status(
        &self,
        collector_id: &str,
        status: CollectorStatus,
        location: Option<GeoPoint>,
        force_release: bool,
    ) -> CoreResult<Collector> {
        let mut collector = self.get_collector(collector_id)?;
        let active = self.active_orders(collector_id)?;
        let mut released_any = false;

        match status {
            CollectorStatus::Busy if active.is_empty() => {
                return Err(CoreError::Validation(format!(
                    "collector {} has no active orders; busy follows from assignment",
                    collector_id
                )));
            }
            CollectorStatus::Available | CollectorStatus::Offline if !active.is_empty() => {
                if !force_release {
                    return Err(CoreError::ConflictingActiveAssignment {
                        collector_id: collector_id.to_string(),
                        active_orders: active.into_iter().map(|o| o.id).collect(),
                    });
                }
                let released = active
                    .into_iter()
                    .try_for_each(|order| self.release_order(order, collector_id).map(drop));
                if let Err(err) = released {
                    // Some orders may already be detached.
                    self.sync_collector(collector_id)?;
                    return Err(err);
                }
                released_any = true;
                // Releasing does not touch the collector row, so `collector` is still current.
            }
            _ => {}
        }

        if collector.status == status && location.is_none() {
            return Ok(collector);
        }

        let from = collector.status;
        collector.status = status;
        if let Some(location) = location {
            collector.report_location(location);
        }
        let expected = collector.next_revision();
        if !self.store.update_collector(&collector, expected)? {
            warn!(collector_id, released_any, "Collector changed during status update");
            if released_any {
                self.sync_collector(collector_id)?;
            }
            return Err(CoreError::concurrent(EntityKind::Collector, collector_id));
        }

        info!(collector_id, from = %from, to = %status, force_release, "Collector status set");
        Ok(collector)
    }

    /// Record a collector's position without changing availability.
    pub fn report_location(&self, collector_id: &str, location: GeoPoint) -> CoreResult<Collector> {
        let mut collector = self.get_collector(collector_id)?;
        collector.report_location(location);
        let expected = collector.next_revision();
        if !self.store.update_collector(&collector, expected)? {
            return Err(CoreError::concurrent(EntityKind::Collector, collector_id));
        }
        debug!(collector_id, lat = location.lat, lng = location.lng, "Collector location reported");
        Ok(collector)
    }

    /// Activate or deactivate a collector. Deactivation requires no active orders.
    pub fn set_collector_active(&self, collector_id: &str, active: bool) -> CoreResult<Collector> {
        let mut collector = self.get_collector(collector_id)?;
        if collector.is_active == active {
            return Ok(collector);
        }
        if !active {
            let holding = self.active_order_ids(collector_id)?;
            if !holding.is_empty() {
                return Err(CoreError::ConflictingActiveAssignment {
                    collector_id: collector_id.to_string(),
                    active_orders: holding,
                });
            }
        }

        collector.is_active = active;
        let expected = collector.next_revision();
        if !self.store.update_collector(&collector, expected)? {
            return Err(CoreError::concurrent(EntityKind::Collector, collector_id));
        }
        info!(collector_id, active, "Collector activation changed");
        Ok(collector)
    }

    /// Re-derive a collector's status from its active orders.
    ///
    /// Retries on write conflicts up to the configured attempt count, then
    /// reports `ConcurrentModification`.
    pub fn sync_collector(&self, collector_id: &str) -> CoreResult<Collector> {
        for attempt in 1..=self.sync_attempts {
            let mut collector = self.get_collector(collector_id)?;
            let has_active = !self.active_orders(collector_id)?.is_empty();
            let derived = derived_status(collector.status, has_active);

            if derived == collector.status {
                return Ok(collector);
            }

            let from = collector.status;
            collector.status = derived;
            let expected = collector.next_revision();
            if self.store.update_collector(&collector, expected)? {
                info!(collector_id, from = %from, to = %derived, "Collector status re-derived");
                return Ok(collector);
            }
            debug!(collector_id, attempt, "Collector changed during sync, retrying");
        }

        warn!(collector_id, attempts = self.sync_attempts, "Collector sync gave up");
        Err(CoreError::concurrent(EntityKind::Collector, collector_id))
    }

    /// Detach a collector from one order; the order keeps its status.
    fn release_order(&self, mut order: LabOrder, collector_id: &str) -> CoreResult<LabOrder> {
        order.collector_id = None;
        let expected = order.next_revision();
        if !self.store.update_order(&order, expected)? {
            return Err(CoreError::concurrent(EntityKind::Order, order.id.as_str()));
        }
        self.history.record_committed(
            &order.id,
            OrderEventKind::CollectorReleased {
                collector_id: collector_id.to_string(),
            },
        );
        info!(order_id = %order.id, collector_id, "Collector released from order");
        Ok(order)
    }

    fn active_order_ids(&self, collector_id: &str) -> CoreResult<Vec<String>> {
        Ok(self
            .active_orders(collector_id)?
            .into_iter()
            .map(|o| o.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Patient;

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Sara".into(), "001".into(), "0912".into(), "Tehran".into());
        db.insert_patient(&patient).unwrap();
        (db, patient.id)
    }

    fn insert_order(db: &Database, patient_id: &str, number: &str) -> LabOrder {
        let order = LabOrder::new(number.into(), patient_id.into(), vec![], "Tehran".into());
        db.insert_order(&order).unwrap();
        order
    }

    #[test]
    fn test_derived_status_table() {
        use CollectorStatus::*;
        assert_eq!(derived_status(Available, true), Busy);
        assert_eq!(derived_status(Offline, true), Busy);
        assert_eq!(derived_status(Busy, true), Busy);
        assert_eq!(derived_status(Busy, false), Available);
        assert_eq!(derived_status(Available, false), Available);
        assert_eq!(derived_status(Offline, false), Offline);
    }

    #[test]
    fn test_assign_marks_collector_busy() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        let order = insert_order(&db, &patient_id, "LAB-1");

        let assigned = tracker.assign_order(&order.id, &collector.id).unwrap();
        assert_eq!(assigned.status, OrderStatus::CollectionScheduled);
        assert_eq!(assigned.collector_id.as_deref(), Some(collector.id.as_str()));
        assert_eq!(
            tracker.get_collector(&collector.id).unwrap().status,
            CollectorStatus::Busy
        );

        // Same assignment again is a no-op
        let again = tracker.assign_order(&order.id, &collector.id).unwrap();
        assert_eq!(again.version, assigned.version);
    }

    #[test]
    fn test_busy_collector_cannot_take_second_order() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        let first = insert_order(&db, &patient_id, "LAB-1");
        let second = insert_order(&db, &patient_id, "LAB-2");

        tracker.assign_order(&first.id, &collector.id).unwrap();
        let err = tracker.assign_order(&second.id, &collector.id).unwrap_err();
        match err {
            CoreError::ConflictingActiveAssignment { active_orders, .. } => {
                assert_eq!(active_orders, vec![first.id.clone()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let second = db.get_order(&second.id).unwrap().unwrap();
        assert_eq!(second.status, OrderStatus::Registered);
        assert!(second.collector_id.is_none());
    }

    #[test]
    fn test_offline_or_inactive_collector_rejected() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let offline = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        tracker
            .set_collector_status(&offline.id, CollectorStatus::Offline, None, false)
            .unwrap();
        let retired = tracker.register_collector("Nima".into(), "0935".into()).unwrap();
        tracker.set_collector_active(&retired.id, false).unwrap();
        let order = insert_order(&db, &patient_id, "LAB-1");

        assert!(matches!(
            tracker.assign_order(&order.id, &offline.id),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            tracker.assign_order(&order.id, &retired.id),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_assign_requires_registered_order() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        let mut order = LabOrder::new("LAB-1".into(), patient_id, vec![], "Tehran".into());
        order.status = OrderStatus::Processing;
        db.insert_order(&order).unwrap();

        assert!(matches!(
            tracker.assign_order(&order.id, &collector.id),
            Err(CoreError::InvalidTransition { from: OrderStatus::Processing, .. })
        ));
        assert_eq!(
            tracker.get_collector(&collector.id).unwrap().status,
            CollectorStatus::Available
        );
    }

    #[test]
    fn test_cannot_go_available_while_holding_order() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        let order = insert_order(&db, &patient_id, "LAB-1");
        tracker.assign_order(&order.id, &collector.id).unwrap();

        for status in [CollectorStatus::Available, CollectorStatus::Offline] {
            assert!(matches!(
                tracker.set_collector_status(&collector.id, status, None, false),
                Err(CoreError::ConflictingActiveAssignment { .. })
            ));
        }
        assert_eq!(
            tracker.get_collector(&collector.id).unwrap().status,
            CollectorStatus::Busy
        );
    }

    #[test]
    fn test_force_release_detaches_orders() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        let order = insert_order(&db, &patient_id, "LAB-1");
        tracker.assign_order(&order.id, &collector.id).unwrap();

        let updated = tracker
            .set_collector_status(&collector.id, CollectorStatus::Offline, None, true)
            .unwrap();
        assert_eq!(updated.status, CollectorStatus::Offline);

        let order = db.get_order(&order.id).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::CollectionScheduled);
        assert!(order.collector_id.is_none());

        let events = db.list_order_events(&order.id).unwrap();
        assert!(matches!(
            events.last().map(|e| &e.kind),
            Some(OrderEventKind::CollectorReleased { .. })
        ));

        // The scheduled order can be picked up by someone else
        let other = tracker.register_collector("Nima".into(), "0935".into()).unwrap();
        let reassigned = tracker.assign_order(&order.id, &other.id).unwrap();
        assert_eq!(reassigned.status, OrderStatus::CollectionScheduled);
        assert_eq!(reassigned.collector_id.as_deref(), Some(other.id.as_str()));
        assert_eq!(tracker.get_collector(&other.id).unwrap().status, CollectorStatus::Busy);
    }

    #[test]
    fn test_manual_busy_requires_assignment() {
        let (db, _) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        assert!(matches!(
            tracker.set_collector_status(&collector.id, CollectorStatus::Busy, None, false),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_status_update_with_location() {
        let (db, _) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        let point = GeoPoint { lat: 35.7, lng: 51.4 };

        let updated = tracker
            .set_collector_status(&collector.id, CollectorStatus::Available, Some(point), false)
            .unwrap();
        assert_eq!(updated.location, Some(point));
        assert_eq!(updated.version, collector.version + 1);

        let moved = tracker
            .report_location(&collector.id, GeoPoint { lat: 35.8, lng: 51.5 })
            .unwrap();
        assert_eq!(moved.status, CollectorStatus::Available);
        assert_eq!(moved.location, Some(GeoPoint { lat: 35.8, lng: 51.5 }));
    }

    #[test]
    fn test_sync_repairs_stuck_busy_collector() {
        let (db, _) = setup();
        let tracker = CollectorTracker::new(&db);
        let mut collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();

        // Simulate drift written behind the tracker's back
        collector.status = CollectorStatus::Busy;
        let expected = collector.next_revision();
        db.update_collector(&collector, expected).unwrap();

        let synced = tracker.sync_collector(&collector.id).unwrap();
        assert_eq!(synced.status, CollectorStatus::Available);
    }

    #[test]
    fn test_deactivate_blocked_by_active_order() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
        let order = insert_order(&db, &patient_id, "LAB-1");
        tracker.assign_order(&order.id, &collector.id).unwrap();

        assert!(matches!(
            tracker.set_collector_active(&collector.id, false),
            Err(CoreError::ConflictingActiveAssignment { .. })
        ));
    }

    #[test]
    fn test_unknown_ids() {
        let (db, patient_id) = setup();
        let tracker = CollectorTracker::new(&db);
        let order = insert_order(&db, &patient_id, "LAB-1");
        assert!(matches!(
            tracker.assign_order(&order.id, "missing"),
            Err(CoreError::NotFound { entity: EntityKind::Collector, .. })
        ));
        assert!(matches!(
            tracker.assign_order("missing", "missing"),
            Err(CoreError::NotFound { entity: EntityKind::Order, .. })
        ));
    }
}
