//! Test result recording.
//!
//! One result per `(order, service)`. Recording is allowed while the sample is
//! in hand (`collected` or `processing`) and never moves the order itself:
//! completing an order stays an explicit lifecycle call.

use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::models::{LabOrder, ResultPayload, ResultStatus, TestResult};
use crate::store::EntityStore;

/// How far an order's results have come.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultProgress {
    pub order_id: String,
    /// Service lines on the order
    pub total: usize,
    /// Lines with a result in any status
    pub recorded: usize,
    /// Lines with a `validated` result
    pub validated: usize,
    /// Lines without a result yet
    pub pending_service_ids: Vec<i64>,
}

impl ResultProgress {
    /// Every line has a validated result.
    pub fn is_fully_validated(&self) -> bool {
        self.total > 0 && self.validated == self.total
    }
}

/// Result recording service.
pub struct ResultRecorder<'a, S: EntityStore> {
    store: &'a S,
}

impl<'a, S: EntityStore> ResultRecorder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create or update the result for one service line of an order.
    pub fn record_result(
        &self,
        order_id: &str,
        service_id: i64,
        payload: ResultPayload,
    ) -> CoreResult<TestResult> {
        let order = self.get_order(order_id)?;

        if !order.status.accepts_results() {
            return Err(CoreError::Validation(format!(
                "order {} is {}; results are recorded while collected or processing",
                order.order_number, order.status
            )));
        }
        if !order.has_service(service_id) {
            return Err(CoreError::Validation(format!(
                "service {} is not part of order {}",
                service_id, order.order_number
            )));
        }
        let existing = self.store.get_result(order_id, service_id)?;
        // A payload without a status keeps the stored one.
        let status = payload
            .status
            .or(existing.as_ref().map(|r| r.status))
            .unwrap_or_default();
        if status != ResultStatus::Pending && payload.value.trim().is_empty() {
            return Err(CoreError::Validation(
                "a result value is required once the result leaves pending".into(),
            ));
        }

        match existing {
            Some(mut existing) => {
                let from = existing.status;
                let expected = existing.apply(payload);
                if !self.store.update_result(&existing, expected)? {
                    warn!(order_id, service_id, "Result changed during update");
                    return Err(CoreError::concurrent(EntityKind::Result, existing.id));
                }
                info!(
                    order_id,
                    service_id,
                    result_id = %existing.id,
                    from = %from,
                    to = %existing.status,
                    "Test result updated"
                );
                Ok(existing)
            }
            None => {
                let payload = self.with_catalog_defaults(service_id, payload)?;
                let result = TestResult::new(order_id.to_string(), service_id, payload);
                if !self.store.insert_result(&result)? {
                    warn!(order_id, service_id, "Result created concurrently");
                    return Err(CoreError::concurrent(
                        EntityKind::Result,
                        format!("{}/{}", order_id, service_id),
                    ));
                }
                info!(
                    order_id,
                    service_id,
                    result_id = %result.id,
                    status = %result.status,
                    "Test result recorded"
                );
                Ok(result)
            }
        }
    }

    /// All results recorded for an order.
    pub fn list_results(&self, order_id: &str) -> CoreResult<Vec<TestResult>> {
        self.get_order(order_id)?;
        Ok(self.store.list_results(order_id)?)
    }

    pub fn progress(&self, order_id: &str) -> CoreResult<ResultProgress> {
        let order = self.get_order(order_id)?;
        let results = self.store.list_results(order_id)?;

        let mut recorded = 0;
        let mut validated = 0;
        let mut pending_service_ids = Vec::new();
        for line in &order.lines {
            match results.iter().find(|r| r.service_id == line.service_id) {
                Some(result) => {
                    recorded += 1;
                    if result.status == ResultStatus::Validated {
                        validated += 1;
                    }
                }
                None => pending_service_ids.push(line.service_id),
            }
        }

        debug!(order_id, recorded, validated, total = order.lines.len(), "Result progress");
        Ok(ResultProgress {
            order_id: order.id,
            total: order.lines.len(),
            recorded,
            validated,
            pending_service_ids,
        })
    }

    fn get_order(&self, order_id: &str) -> CoreResult<LabOrder> {
        self.store
            .get_order(order_id)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Order, order_id))
    }

    /// Fill a missing normal range or unit from the catalog entry.
    fn with_catalog_defaults(
        &self,
        service_id: i64,
        mut payload: ResultPayload,
    ) -> CoreResult<ResultPayload> {
        if payload.normal_range.is_some() && payload.unit.is_some() {
            return Ok(payload);
        }
        if let Some(service) = self.store.get_service(service_id)? {
            if payload.normal_range.is_none() {
                payload.normal_range = service.reference_range;
            }
            if payload.unit.is_none() {
                payload.unit = service.unit;
            }
        }
        Ok(payload)
    }
}
