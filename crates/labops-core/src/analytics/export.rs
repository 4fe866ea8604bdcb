//! Report export.

use super::Stats;

impl Stats {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Daily series as CSV.
    pub fn daily_csv(&self) -> String {
        let mut csv = String::from("date,orders,revenue\n");
        for point in &self.daily_orders {
            csv.push_str(&format!(
                "{},{},{}\n",
                point.date.format("%Y-%m-%d"),
                point.orders,
                point.revenue
            ));
        }
        csv
    }

    /// Collector performance as CSV.
    pub fn collectors_csv(&self) -> String {
        let mut csv = String::from("collector_id,name,orders_handled,completed,efficiency\n");
        for perf in &self.collector_performance {
            csv.push_str(&format!(
                "{},{},{},{},{:.1}\n",
                escape_csv(&perf.collector_id),
                escape_csv(&perf.name),
                perf.orders_handled,
                perf.completed,
                perf.efficiency,
            ));
        }
        csv
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
