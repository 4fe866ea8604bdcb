//! Sample collector models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp_now;

/// Collector availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorStatus {
    Available,
    Busy,
    Offline,
}

impl CollectorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid collector status: {s}")),
        }
    }
}

/// Last reported position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A field agent who visits patients to collect samples.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collector {
    /// Unique collector ID
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Availability; `busy` is derived from active assignments
    pub status: CollectorStatus,
    /// Inactive collectors are never assigned
    pub is_active: bool,
    /// Last known location
    pub location: Option<GeoPoint>,
    /// When `location` was reported
    pub location_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-lock version, bumped on every write
    pub version: i64,
}

impl Collector {
    /// Create an active, available collector.
    pub fn new(name: String, phone: String) -> Self {
        let now = timestamp_now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            phone,
            status: CollectorStatus::Available,
            is_active: true,
            location: None,
            location_updated_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Can take a new assignment right now.
    pub fn is_assignable(&self) -> bool {
        self.is_active && self.status == CollectorStatus::Available
    }

    /// Record a reported location.
    pub fn report_location(&mut self, location: GeoPoint) {
        self.location = Some(location);
        self.location_updated_at = Some(timestamp_now());
    }

    /// Prepare the next revision; returns the version the write is conditioned on.
    pub fn next_revision(&mut self) -> i64 {
        let expected = self.version;
        self.version += 1;
        self.updated_at = timestamp_now();
        expected
    }
}
