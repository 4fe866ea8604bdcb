//! Patient models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp_now;

/// A patient. Identity fields are fixed at registration; only contact fields change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Unique patient ID
    pub id: String,
    /// Full name
    pub name: String,
    /// National identification number
    pub national_id: String,
    /// Contact phone
    pub phone: String,
    /// Home address (default collection address)
    pub address: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(name: String, national_id: String, phone: String, address: String) -> Self {
        let now = timestamp_now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            national_id,
            phone,
            address,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new(
            "Sara Ahmadi".into(),
            "0012345678".into(),
            "09120000000".into(),
            "Tehran, Valiasr St".into(),
        );
        assert_eq!(patient.name, "Sara Ahmadi");
        assert_eq!(patient.id.len(), 36); // UUID format
        assert_eq!(patient.created_at, patient.updated_at);
    }
}
