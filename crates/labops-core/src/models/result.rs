//! Test result models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp_now;

/// Result workflow status. Advisory: operators may set any value at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    #[default]
    Pending,
    Completed,
    Reviewed,
    Validated,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Reviewed => "reviewed",
            Self::Validated => "validated",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "reviewed" => Ok(Self::Reviewed),
            "validated" => Ok(Self::Validated),
            _ => Err(format!("Invalid result status: {s}")),
        }
    }
}

/// The result of one service line of an order. Keyed by `(order_id, service_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    /// Stable result ID, preserved across edits
    pub id: String,
    pub order_id: String,
    pub service_id: i64,
    /// Free-text result value
    pub value: String,
    pub normal_range: Option<String>,
    pub unit: Option<String>,
    pub status: ResultStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-lock version, bumped on every write
    pub version: i64,
}

/// Operator input for recording a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultPayload {
    pub value: String,
    pub normal_range: Option<String>,
    pub unit: Option<String>,
    /// Keep the current status when `None` (new results start `pending`)
    pub status: Option<ResultStatus>,
    pub notes: Option<String>,
}

impl TestResult {
    /// Create a result from a payload.
    pub fn new(order_id: String, service_id: i64, payload: ResultPayload) -> Self {
        let now = timestamp_now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order_id,
            service_id,
            value: payload.value,
            normal_range: payload.normal_range,
            unit: payload.unit,
            status: payload.status.unwrap_or_default(),
            notes: payload.notes,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Apply an edit in place. Identity and creation time are preserved.
    pub fn apply(&mut self, payload: ResultPayload) -> i64 {
        self.value = payload.value;
        if payload.normal_range.is_some() {
            self.normal_range = payload.normal_range;
        }
        if payload.unit.is_some() {
            self.unit = payload.unit;
        }
        if let Some(status) = payload.status {
            self.status = status;
        }
        if payload.notes.is_some() {
            self.notes = payload.notes;
        }
        let expected = self.version;
        self.version += 1;
        self.updated_at = timestamp_now();
        expected
    }
}
