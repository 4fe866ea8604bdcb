//! Lab service catalog models.

use serde::{Deserialize, Serialize};

/// A test the lab offers. Read-only reference data for orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabService {
    /// Catalog ID
    pub id: i64,
    /// Short code (e.g. "CBC", "FBS")
    pub code: String,
    /// Display name
    pub name: String,
    /// Category (e.g. "hematology", "biochemistry")
    pub category: String,
    /// Current list price
    pub price: i64,
    /// Sample type (e.g. "blood", "urine")
    pub sample_type: String,
    /// Default reference range for results
    pub reference_range: Option<String>,
    /// Default result unit
    pub unit: Option<String>,
    /// Whether new orders may use this service
    pub active: bool,
}

impl LabService {
    /// Create a new active catalog entry.
    pub fn new(id: i64, code: String, name: String, category: String, price: i64) -> Self {
        Self {
            id,
            code,
            name,
            category,
            price,
            sample_type: "blood".into(),
            reference_range: None,
            unit: None,
            active: true,
        }
    }
}
