#![allow(dead_code)]

pub mod strategies;

use labops_core::db::Database;
use labops_core::models::{CollectorStatus, LabService, Patient};
use labops_core::{CollectorTracker, EntityStore, LabOrder, NewOrder, OrderFilter, OrderItem, OrderLifecycle};

/// Service IDs seeded by [`seed_catalog`].
pub const CBC: i64 = 1;
pub const FBS: i64 = 7;
pub const LIPID: i64 = 9;

/// Insert a small catalog: CBC and FBS at 150,000, lipid panel at 300,000.
pub fn seed_catalog(db: &Database) {
    let mut cbc = LabService::new(CBC, "CBC".into(), "Complete Blood Count".into(), "hematology".into(), 150_000);
    cbc.reference_range = Some("4.5-11.0".into());
    cbc.unit = Some("10^9/L".into());
    db.insert_service(&cbc).unwrap();

    let mut fbs = LabService::new(FBS, "FBS".into(), "Fasting Blood Sugar".into(), "biochemistry".into(), 150_000);
    fbs.reference_range = Some("70-100".into());
    fbs.unit = Some("mg/dL".into());
    db.insert_service(&fbs).unwrap();

    db.insert_service(&LabService::new(LIPID, "LIPID".into(), "Lipid Panel".into(), "biochemistry".into(), 300_000))
        .unwrap();
}

pub fn seed_patient(db: &Database, national_id: &str) -> Patient {
    let patient = Patient::new(
        format!("Patient {}", national_id),
        national_id.into(),
        "09120000000".into(),
        "Tehran, Valiasr St".into(),
    );
    db.insert_patient(&patient).unwrap();
    patient
}

/// In-memory database with the catalog and one patient.
pub fn setup() -> (Database, Patient) {
    let db = Database::open_in_memory().unwrap();
    seed_catalog(&db);
    let patient = seed_patient(&db, "0012345678");
    (db, patient)
}

/// CBC + 2 x FBS: 450,000 in total.
pub fn standard_order(patient_id: &str) -> NewOrder {
    NewOrder {
        patient_id: patient_id.to_string(),
        items: vec![OrderItem::single(CBC), OrderItem { service_id: FBS, quantity: 2 }],
        ..Default::default()
    }
}

/// Register an order and advance it `steps` times along the lifecycle.
pub fn order_at<S: EntityStore>(lifecycle: &OrderLifecycle<'_, S>, patient_id: &str, steps: usize) -> LabOrder {
    let mut order = lifecycle.register_order(standard_order(patient_id)).unwrap();
    for _ in 0..steps {
        order = lifecycle.advance(&order.id).unwrap();
    }
    order
}

/// Panic unless every collector is busy exactly when it holds an active order.
pub fn assert_collector_invariant<S: EntityStore>(store: &S) {
    let tracker = CollectorTracker::new(store);
    for collector in store.list_collectors(&Default::default()).unwrap() {
        let active = tracker.active_orders(&collector.id).unwrap();
        let busy = collector.status == CollectorStatus::Busy;
        assert_eq!(
            busy,
            !active.is_empty(),
            "collector {} is {} while holding {} active orders",
            collector.id,
            collector.status,
            active.len()
        );
    }
    // No order outside collection_scheduled/collected counts as active.
    let all = store.list_orders(&OrderFilter::all()).unwrap();
    for order in all.iter().filter(|o| !o.status.holds_collector()) {
        if let Some(collector_id) = &order.collector_id {
            assert!(!order.holds_collector(collector_id));
        }
    }
}
