use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use labops_core::models::{LabOrder, OrderServiceLine, OrderStatus};

/// Fixed report end so windows never depend on the wall clock.
pub fn report_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

pub fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

/// Orders created up to 60 days before [`report_end`], some after it.
pub fn order_strategy() -> impl Strategy<Value = LabOrder> {
    (order_status_strategy(), 1i64..1_000_000, -24i64 * 3..24 * 60, 1u32..4).prop_map(
        |(status, price, hours_back, quantity)| {
            let mut order = LabOrder::new(
                "LAB-PROP".into(),
                "patient".into(),
                vec![OrderServiceLine {
                    service_id: 1,
                    service_name: "CBC".into(),
                    quantity,
                    price,
                }],
                "addr".into(),
            );
            order.status = status;
            order.created_at = report_end() - Duration::hours(hours_back);
            order
        },
    )
}

pub fn orders_strategy() -> impl Strategy<Value = Vec<LabOrder>> {
    prop::collection::vec(order_strategy(), 0..40)
}

/// One step of a random workload against the lifecycle and tracker.
#[derive(Debug, Clone)]
pub enum Operation {
    Assign { order: usize, collector: usize },
    Advance { order: usize },
    Transition { order: usize, target: OrderStatus },
    Cancel { order: usize },
    SetStatus { collector: usize, status: usize, force: bool },
}

pub fn operation_strategy(orders: usize, collectors: usize) -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0..orders, 0..collectors).prop_map(|(order, collector)| Operation::Assign { order, collector }),
        4 => (0..orders).prop_map(|order| Operation::Advance { order }),
        2 => (0..orders, order_status_strategy())
            .prop_map(|(order, target)| Operation::Transition { order, target }),
        1 => (0..orders).prop_map(|order| Operation::Cancel { order }),
        2 => (0..collectors, 0usize..3, any::<bool>())
            .prop_map(|(collector, status, force)| Operation::SetStatus { collector, status, force }),
    ]
}
