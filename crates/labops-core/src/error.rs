//! Business-operation errors.

use std::fmt;

use thiserror::Error;

use crate::db::DbError;
use crate::models::OrderStatus;

/// Which aggregate an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Patient,
    Collector,
    Service,
    Order,
    Result,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Patient => "Patient",
            Self::Collector => "Collector",
            Self::Service => "Service",
            Self::Order => "Order",
            Self::Result => "Test result",
        };
        f.write_str(name)
    }
}

/// Errors returned by the lifecycle, assignment, result and reporting services.
///
/// Everything except `Store` is an expected business outcome the caller can act on.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("Invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Collector {collector_id} still holds active orders: {}", .active_orders.join(", "))]
    ConflictingActiveAssignment {
        collector_id: String,
        active_orders: Vec<String>,
    },

    #[error("{entity} {id} was modified concurrently, re-read and retry")]
    ConcurrentModification { entity: EntityKind, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub(crate) fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn concurrent(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::ConcurrentModification {
            entity,
            id: id.into(),
        }
    }

    /// Re-reading and reapplying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}
