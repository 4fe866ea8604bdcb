//! Operational analytics.
//!
//! [`compute_stats`] is a pure function over an order and collector snapshot.
//! [`snapshot`] reads that snapshot through the store; reports tolerate the
//! snapshot being a moment stale.

mod export;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreResult;
use crate::models::{Collector, LabOrder, OrderStatus};
use crate::store::{CollectorFilter, EntityStore, OrderFilter};

/// Longest daily series a report carries.
pub const MAX_DAILY_POINTS: u32 = 30;

/// Reporting window: `[end - days, end]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl DateRange {
    pub fn last_days(end: DateTime<Utc>, days: u32) -> Self {
        Self { end, days }
    }

    /// Window start; windows reaching past the earliest representable time
    /// start there.
    pub fn start(&self) -> DateTime<Utc> {
        self.end
            .checked_sub_signed(Duration::days(i64::from(self.days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start() && ts <= self.end
    }

    /// Calendar days of the daily series, oldest first, ending on `end`'s day.
    pub fn series_days(&self) -> Vec<NaiveDate> {
        let last = self.end.date_naive();
        let count = self.days.min(MAX_DAILY_POINTS);
        (0..count)
            .rev()
            .filter_map(|back| last.checked_sub_signed(Duration::days(i64::from(back))))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub orders: usize,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorPerformance {
    pub collector_id: String,
    pub name: String,
    /// In-window orders assigned to this collector
    pub orders_handled: usize,
    /// Of those, delivered
    pub completed: usize,
    /// `completed / orders_handled * 100`, 0 without orders
    pub efficiency: f64,
}

/// Usage of one catalog service across in-window orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceUsage {
    pub service_id: i64,
    pub service_name: String,
    /// Orders carrying this service
    pub orders: usize,
    pub quantity: u64,
    pub revenue: i64,
}

/// Operational statistics for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub window: DateRange,
    pub total_orders: usize,
    pub delivered_orders: usize,
    /// Percentage of in-window orders delivered
    pub completion_rate: f64,
    pub total_revenue: i64,
    pub avg_order_value: f64,
    /// Every status, zero-filled; counts sum to `total_orders`
    pub status_distribution: Vec<StatusCount>,
    pub daily_orders: Vec<DailyPoint>,
    pub collector_performance: Vec<CollectorPerformance>,
    pub service_breakdown: Vec<ServiceUsage>,
}

impl Stats {
    pub fn count_for(&self, status: OrderStatus) -> usize {
        self.status_distribution
            .iter()
            .find(|s| s.status == status)
            .map_or(0, |s| s.count)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Compute window statistics from an order and collector snapshot.
pub fn compute_stats(orders: &[LabOrder], collectors: &[Collector], window: &DateRange) -> Stats {
    let in_window: Vec<&LabOrder> = orders
        .iter()
        .filter(|o| window.contains(o.created_at))
        .collect();

    let total_orders = in_window.len();
    let delivered_orders = in_window
        .iter()
        .filter(|o| o.status == OrderStatus::Delivered)
        .count();
    let total_revenue: i64 = in_window.iter().map(|o| o.total_amount).sum();
    let avg_order_value = if total_orders == 0 {
        0.0
    } else {
        total_revenue as f64 / total_orders as f64
    };

    let status_distribution = OrderStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: in_window.iter().filter(|o| o.status == status).count(),
        })
        .collect();

    let daily_orders = window
        .series_days()
        .into_iter()
        .map(|date| {
            let same_day = in_window.iter().filter(|o| o.created_at.date_naive() == date);
            let (orders, revenue) =
                same_day.fold((0, 0), |(n, sum), o| (n + 1, sum + o.total_amount));
            DailyPoint {
                date,
                orders,
                revenue,
            }
        })
        .collect();

    let collector_performance = collectors
        .iter()
        .map(|collector| {
            let handled: Vec<&&LabOrder> = in_window
                .iter()
                .filter(|o| o.collector_id.as_deref() == Some(collector.id.as_str()))
                .collect();
            let completed = handled
                .iter()
                .filter(|o| o.status == OrderStatus::Delivered)
                .count();
            CollectorPerformance {
                collector_id: collector.id.clone(),
                name: collector.name.clone(),
                orders_handled: handled.len(),
                completed,
                efficiency: percentage(completed, handled.len()),
            }
        })
        .collect();

    let mut usage: BTreeMap<i64, ServiceUsage> = BTreeMap::new();
    for order in &in_window {
        for line in &order.lines {
            let entry = usage.entry(line.service_id).or_insert_with(|| ServiceUsage {
                service_id: line.service_id,
                service_name: line.service_name.clone(),
                orders: 0,
                quantity: 0,
                revenue: 0,
            });
            entry.orders += 1;
            entry.quantity += u64::from(line.quantity);
            entry.revenue += line.line_total();
        }
    }
    let mut service_breakdown: Vec<ServiceUsage> = usage.into_values().collect();
    // Stable sort keeps ascending service id among equal counts.
    service_breakdown.sort_by(|a, b| b.orders.cmp(&a.orders));

    Stats {
        window: *window,
        total_orders,
        delivered_orders,
        completion_rate: percentage(delivered_orders, total_orders),
        total_revenue,
        avg_order_value,
        status_distribution,
        daily_orders,
        collector_performance,
        service_breakdown,
    }
}

/// Read the window's orders and all collectors from the store and compute stats.
pub fn snapshot<S: EntityStore>(store: &S, window: &DateRange) -> CoreResult<Stats> {
    let orders = store.list_orders(&OrderFilter::created_between(window.start(), window.end))?;
    let collectors = store.list_collectors(&CollectorFilter::all())?;
    debug!(
        orders = orders.len(),
        collectors = collectors.len(),
        days = window.days,
        "Computing stats"
    );
    Ok(compute_stats(&orders, &collectors, window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderServiceLine;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn order(amount: i64, status: OrderStatus, created_at: DateTime<Utc>) -> LabOrder {
        let mut order = LabOrder::new(
            "LAB".into(),
            "patient".into(),
            vec![OrderServiceLine {
                service_id: 1,
                service_name: "CBC".into(),
                quantity: 1,
                price: amount,
            }],
            "addr".into(),
        );
        order.status = status;
        order.created_at = created_at;
        order
    }

    #[test]
    fn test_empty_set() {
        let window = DateRange::last_days(at(2024, 3, 10, 12), 7);
        let stats = compute_stats(&[], &[], &window);
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.avg_order_value, 0.0);
        assert_eq!(stats.status_distribution.len(), 7);
        assert!(stats.status_distribution.iter().all(|s| s.count == 0));
        assert_eq!(stats.daily_orders.len(), 7);
    }

    #[test]
    fn test_seven_day_window_figures() {
        let end = at(2024, 3, 10, 12);
        let window = DateRange::last_days(end, 7);
        let orders = vec![
            order(100, OrderStatus::Delivered, at(2024, 3, 9, 8)),
            order(200, OrderStatus::Delivered, at(2024, 3, 9, 9)),
            order(300, OrderStatus::Delivered, at(2024, 3, 5, 9)),
            order(50, OrderStatus::Registered, at(2024, 3, 10, 11)),
            // Outside the window on either side
            order(9_999, OrderStatus::Delivered, at(2024, 3, 1, 9)),
            order(9_999, OrderStatus::Delivered, at(2024, 3, 10, 13)),
        ];

        let stats = compute_stats(&orders, &[], &window);
        assert_eq!(stats.total_orders, 4);
        assert_eq!(stats.completion_rate, 75.0);
        assert_eq!(stats.total_revenue, 650);
        assert_eq!(stats.avg_order_value, 162.5);
        assert_eq!(stats.count_for(OrderStatus::Delivered), 3);
        assert_eq!(stats.count_for(OrderStatus::Registered), 1);
        assert_eq!(stats.count_for(OrderStatus::Processing), 0);

        let sum: usize = stats.status_distribution.iter().map(|s| s.count).sum();
        assert_eq!(sum, stats.total_orders);
    }

    #[test]
    fn test_window_lower_bound_inclusive() {
        let end = at(2024, 3, 10, 12);
        let window = DateRange::last_days(end, 7);
        let orders = vec![
            order(10, OrderStatus::Registered, window.start()),
            order(10, OrderStatus::Registered, window.start() - Duration::microseconds(1)),
        ];
        assert_eq!(compute_stats(&orders, &[], &window).total_orders, 1);
    }

    #[test]
    fn test_daily_series_oldest_first() {
        let end = at(2024, 3, 10, 12);
        let window = DateRange::last_days(end, 3);
        let orders = vec![
            order(100, OrderStatus::Registered, at(2024, 3, 8, 13)),
            order(200, OrderStatus::Registered, at(2024, 3, 10, 1)),
            order(300, OrderStatus::Registered, at(2024, 3, 10, 2)),
        ];

        let stats = compute_stats(&orders, &[], &window);
        let days: Vec<NaiveDate> = stats.daily_orders.iter().map(|p| p.date).collect();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            ]
        );
        assert_eq!(stats.daily_orders[0].orders, 1);
        assert_eq!(stats.daily_orders[1].orders, 0);
        assert_eq!(stats.daily_orders[2].orders, 2);
        assert_eq!(stats.daily_orders[2].revenue, 500);
    }

    #[test]
    fn test_daily_series_capped() {
        let window = DateRange::last_days(at(2024, 3, 10, 12), 90);
        let stats = compute_stats(&[], &[], &window);
        assert_eq!(stats.daily_orders.len(), MAX_DAILY_POINTS as usize);
        assert_eq!(
            stats.daily_orders.last().map(|p| p.date),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
    }

    #[test]
    fn test_widest_window_clamps_start() {
        let window = DateRange::last_days(at(2024, 3, 10, 12), u32::MAX);
        assert_eq!(window.start(), DateTime::<Utc>::MIN_UTC);
        assert!(window.contains(at(1970, 1, 1, 0)));

        let stats = compute_stats(&[order(50, OrderStatus::Registered, at(2001, 6, 1, 8))], &[], &window);
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.daily_orders.len(), MAX_DAILY_POINTS as usize);
    }

    #[test]
    fn test_snapshot_with_widest_window() {
        let db = crate::db::Database::open_in_memory().unwrap();
        let stats = snapshot(&db, &DateRange::last_days(Utc::now(), u32::MAX)).unwrap();
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.completion_rate, 0.0);
    }

    #[test]
    fn test_idle_collector_still_reported() {
        let window = DateRange::last_days(at(2024, 3, 10, 12), 7);
        let busy = Collector::new("Reza".into(), "0912".into());
        let idle = Collector::new("Nima".into(), "0935".into());

        let mut delivered = order(100, OrderStatus::Delivered, at(2024, 3, 9, 8));
        delivered.collector_id = Some(busy.id.clone());
        let mut collected = order(100, OrderStatus::Collected, at(2024, 3, 9, 9));
        collected.collector_id = Some(busy.id.clone());

        let stats = compute_stats(&[delivered, collected], &[busy.clone(), idle.clone()], &window);
        assert_eq!(stats.collector_performance.len(), 2);

        let perf = &stats.collector_performance[0];
        assert_eq!(perf.collector_id, busy.id);
        assert_eq!(perf.orders_handled, 2);
        assert_eq!(perf.completed, 1);
        assert_eq!(perf.efficiency, 50.0);

        let perf = &stats.collector_performance[1];
        assert_eq!(perf.collector_id, idle.id);
        assert_eq!(perf.orders_handled, 0);
        assert_eq!(perf.efficiency, 0.0);
    }

    #[test]
    fn test_service_breakdown() {
        let window = DateRange::last_days(at(2024, 3, 10, 12), 7);
        let mut two_lines = order(100, OrderStatus::Registered, at(2024, 3, 9, 8));
        two_lines.lines.push(OrderServiceLine {
            service_id: 7,
            service_name: "FBS".into(),
            quantity: 3,
            price: 20,
        });
        let one_line = order(100, OrderStatus::Registered, at(2024, 3, 9, 9));

        let stats = compute_stats(&[two_lines, one_line], &[], &window);
        assert_eq!(stats.service_breakdown.len(), 2);
        assert_eq!(stats.service_breakdown[0].service_id, 1);
        assert_eq!(stats.service_breakdown[0].orders, 2);
        assert_eq!(stats.service_breakdown[0].revenue, 200);
        assert_eq!(stats.service_breakdown[1].quantity, 3);
        assert_eq!(stats.service_breakdown[1].revenue, 60);
    }
}
