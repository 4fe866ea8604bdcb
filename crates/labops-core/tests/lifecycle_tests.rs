//! End-to-end order lifecycle tests against the SQLite store.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use labops_core::analytics::{self, compute_stats, DateRange};
use labops_core::models::{CollectorStatus, LabOrder, OrderServiceLine, OrderStatus, ResultPayload, ResultStatus};
use labops_core::{CollectorTracker, CoreError, DeliveryOutcome, OrderEventKind, OrderLifecycle, ResultRecorder};

#[test]
fn test_order_travels_full_lifecycle_and_frees_collector() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let tracker = CollectorTracker::new(&db);

    let order = lifecycle.register_order(standard_order(&patient.id)).unwrap();
    assert_eq!(order.total_amount, 450_000);
    assert_eq!(order.status, OrderStatus::Registered);

    let collector = tracker.register_collector("Reza".into(), "09121111111".into()).unwrap();
    assert_eq!(collector.status, CollectorStatus::Available);

    let order = tracker.assign_order(&order.id, &collector.id).unwrap();
    assert_eq!(order.status, OrderStatus::CollectionScheduled);
    assert_eq!(tracker.get_collector(&collector.id).unwrap().status, CollectorStatus::Busy);
    assert_collector_invariant(&db);

    for target in [
        OrderStatus::Collected,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Delivered,
    ] {
        let moved = lifecycle.transition(&order.id, target).unwrap();
        assert_eq!(moved.status, target);
        assert_collector_invariant(&db);
    }

    assert_eq!(
        tracker.get_collector(&collector.id).unwrap().status,
        CollectorStatus::Available
    );
    assert!(lifecycle.verify_history(&order.id).unwrap().is_intact());
}

#[test]
fn test_skipping_to_delivered_is_invalid() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let order = lifecycle.register_order(standard_order(&patient.id)).unwrap();

    let err = lifecycle.transition(&order.id, OrderStatus::Delivered).unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
    assert_eq!(lifecycle.get_order(&order.id).unwrap(), order);
    assert_eq!(lifecycle.history(&order.id).unwrap().len(), 1);
}

#[test]
fn test_bulk_delivery_skips_ineligible_orders() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let completed = order_at(&lifecycle, &patient.id, 4);
    let collected = order_at(&lifecycle, &patient.id, 2);

    let report = lifecycle.bulk_deliver(&[completed.id.clone(), collected.id.clone()]);

    assert!(matches!(report.outcome(&completed.id), Some(DeliveryOutcome::Delivered(_))));
    assert!(matches!(
        report.outcome(&collected.id),
        Some(DeliveryOutcome::Skipped { status: OrderStatus::Collected })
    ));
    assert_eq!(lifecycle.get_order(&completed.id).unwrap().status, OrderStatus::Delivered);
    assert_eq!(lifecycle.get_order(&collected.id).unwrap().status, OrderStatus::Collected);
}

#[test]
fn test_bulk_delivery_twice_changes_nothing_more() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let tracker = CollectorTracker::new(&db);
    let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();

    let order = lifecycle.register_order(standard_order(&patient.id)).unwrap();
    tracker.assign_order(&order.id, &collector.id).unwrap();
    for _ in 0..3 {
        lifecycle.advance(&order.id).unwrap();
    }
    let ids = vec![order.id.clone()];

    lifecycle.bulk_deliver(&ids);
    let snapshot = (
        lifecycle.get_order(&order.id).unwrap(),
        tracker.get_collector(&collector.id).unwrap(),
        lifecycle.history(&order.id).unwrap(),
    );

    let report = lifecycle.bulk_deliver(&ids);
    assert_eq!(report.already_delivered_count(), 1);
    assert_eq!(
        (
            lifecycle.get_order(&order.id).unwrap(),
            tracker.get_collector(&collector.id).unwrap(),
            lifecycle.history(&order.id).unwrap(),
        ),
        snapshot
    );
}

#[test]
fn test_redelivering_is_a_successful_no_op() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let delivered = order_at(&lifecycle, &patient.id, 5);

    let again = lifecycle.transition(&delivered.id, OrderStatus::Delivered).unwrap();
    assert_eq!(again.status, OrderStatus::Delivered);
    assert_eq!(again.updated_at, delivered.updated_at);
    assert_eq!(again.version, delivered.version);
}

#[test]
fn test_result_recorded_twice_updates_in_place() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let recorder = ResultRecorder::new(&db);
    let order = order_at(&lifecycle, &patient.id, 2);

    let first = recorder
        .record_result(&order.id, FBS, ResultPayload { value: "95".into(), ..Default::default() })
        .unwrap();
    let second = recorder
        .record_result(
            &order.id,
            FBS,
            ResultPayload {
                value: "102".into(),
                status: Some(ResultStatus::Reviewed),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(first.id, second.id);
    let results = recorder.list_results(&order.id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value, "102");
    assert_eq!(results[0].status, ResultStatus::Reviewed);
    assert_eq!(results[0].unit.as_deref(), Some("mg/dL"));
    assert_eq!(lifecycle.get_order(&order.id).unwrap().status, OrderStatus::Collected);
}

fn priced_order(amount: i64, status: OrderStatus, hours_ago: i64) -> LabOrder {
    let end = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let mut order = LabOrder::new(
        format!("LAB-{}-{}", amount, hours_ago),
        "patient".into(),
        vec![OrderServiceLine {
            service_id: CBC,
            service_name: "CBC".into(),
            quantity: 1,
            price: amount,
        }],
        "addr".into(),
    );
    order.status = status;
    order.created_at = end - Duration::hours(hours_ago);
    order
}

#[test]
fn test_seven_day_stats() {
    let end = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let orders = vec![
        priced_order(100, OrderStatus::Delivered, 10),
        priced_order(200, OrderStatus::Delivered, 30),
        priced_order(300, OrderStatus::Delivered, 100),
        priced_order(50, OrderStatus::Registered, 1),
    ];

    let stats = compute_stats(&orders, &[], &DateRange::last_days(end, 7));
    assert_eq!(stats.total_orders, 4);
    assert_eq!(stats.completion_rate, 75.0);
    assert_eq!(stats.total_revenue, 650);
    assert_eq!(stats.avg_order_value, 162.5);
}

#[test]
fn test_stats_snapshot_through_store() {
    let (db, patient) = setup();
    let tracker = CollectorTracker::new(&db);
    let idle = tracker.register_collector("Nima".into(), "0935".into()).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

    for (amount, status, hours) in [
        (100, OrderStatus::Delivered, 10),
        (200, OrderStatus::Delivered, 30),
        (300, OrderStatus::Delivered, 100),
        (50, OrderStatus::Registered, 1),
        (999, OrderStatus::Delivered, 24 * 8),
    ] {
        let mut order = priced_order(amount, status, hours);
        order.patient_id = patient.id.clone();
        db.insert_order(&order).unwrap();
    }

    let stats = analytics::snapshot(&db, &DateRange::last_days(end, 7)).unwrap();
    assert_eq!(stats.total_orders, 4);
    assert_eq!(stats.total_revenue, 650);
    assert_eq!(stats.count_for(OrderStatus::Delivered), 3);
    assert_eq!(stats.daily_orders.len(), 7);
    assert_eq!(stats.daily_orders.iter().map(|p| p.orders).sum::<usize>(), 4);
    assert_eq!(stats.collector_performance.len(), 1);
    assert_eq!(stats.collector_performance[0].collector_id, idle.id);
    assert_eq!(stats.collector_performance[0].orders_handled, 0);
}

#[test]
fn test_force_release_and_reassign_keeps_history() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let tracker = CollectorTracker::new(&db);
    let first = tracker.register_collector("Reza".into(), "0912".into()).unwrap();
    let second = tracker.register_collector("Nima".into(), "0935".into()).unwrap();

    let order = lifecycle.register_order(standard_order(&patient.id)).unwrap();
    tracker.assign_order(&order.id, &first.id).unwrap();
    tracker
        .set_collector_status(&first.id, CollectorStatus::Offline, None, true)
        .unwrap();
    assert_collector_invariant(&db);

    tracker.assign_order(&order.id, &second.id).unwrap();
    lifecycle.advance(&order.id).unwrap();
    assert_collector_invariant(&db);

    let kinds: Vec<OrderEventKind> = lifecycle
        .history(&order.id)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(matches!(kinds[0], OrderEventKind::Created { .. }));
    assert!(kinds.contains(&OrderEventKind::CollectorReleased { collector_id: first.id.clone() }));
    assert!(kinds.contains(&OrderEventKind::CollectorAssigned { collector_id: second.id.clone() }));
    assert!(lifecycle.verify_history(&order.id).unwrap().is_intact());
}

#[test]
fn test_collector_with_two_jobs_stays_busy_until_both_leave_collection() {
    let (db, patient) = setup();
    let lifecycle = OrderLifecycle::new(&db);
    let tracker = CollectorTracker::new(&db);
    let collector = tracker.register_collector("Reza".into(), "0912".into()).unwrap();

    let first = lifecycle.register_order(standard_order(&patient.id)).unwrap();
    let second = lifecycle.register_order(standard_order(&patient.id)).unwrap();
    tracker.assign_order(&first.id, &collector.id).unwrap();

    // Put the second order under the same collector, as a data import would.
    let mut imported = lifecycle.get_order(&second.id).unwrap();
    imported.collector_id = Some(collector.id.clone());
    imported.status = OrderStatus::CollectionScheduled;
    let expected = imported.next_revision();
    assert!(db.update_order(&imported, expected).unwrap());

    lifecycle.advance(&first.id).unwrap();
    lifecycle.advance(&first.id).unwrap();
    assert_eq!(tracker.get_collector(&collector.id).unwrap().status, CollectorStatus::Busy);

    lifecycle.cancel(&second.id).unwrap();
    assert_eq!(
        tracker.get_collector(&collector.id).unwrap().status,
        CollectorStatus::Available
    );
    assert_collector_invariant(&db);
}
