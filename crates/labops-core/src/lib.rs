//! LabOps Core Library
//!
//! Order lifecycle, collector assignment, result recording and operational
//! analytics for a home-collection laboratory service.
//!
//! # Architecture
//!
//! ```text
//!   register_order ──▶ registered
//!                          │  assign_order (collector: available → busy)
//!                          ▼
//!                 collection_scheduled ─┐
//!                          │            │
//!                          ▼            │ collector busy
//!                      collected ───────┘
//!                          │  record_result (collected | processing)
//!                          ▼
//!                      processing      (collector re-derived → available)
//!                          │
//!                          ▼
//!                      completed ──▶ delivered   (bulk_deliver)
//!
//!   any status but delivered ──▶ cancelled
//!
//!   every write: read → validate → compare-and-swap on version
//!   every change: hash-chained order history
//! ```
//!
//! # Core Principle
//!
//! **A collector is busy exactly while it holds an order in
//! `collection_scheduled` or `collected`.** That status is re-derived after
//! every change on either side, never maintained by hand.
//!
//! # Modules
//!
//! - [`db`]: SQLite entity store
//! - [`store`]: the store interface the services are written against
//! - [`models`]: Domain types (LabOrder, Collector, TestResult, etc.)
//! - [`lifecycle`]: Order registration, transitions and bulk delivery
//! - [`collectors`]: Collector assignment and availability
//! - [`results`]: Test result recording
//! - [`analytics`]: Window statistics and report export
//! - [`audit`]: Hash-chained order history
//! - [`catalog`]: Typo-tolerant service search

pub mod analytics;
pub mod audit;
pub mod catalog;
pub mod collectors;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod results;
pub mod store;

// Re-export commonly used types
pub use analytics::{compute_stats, DateRange, Stats};
pub use audit::{HistoryVerification, OrderHistory};
pub use catalog::{CatalogSearch, ServiceMatch};
pub use collectors::CollectorTracker;
pub use config::LabOpsConfig;
pub use db::Database;
pub use error::{CoreError, CoreResult, EntityKind};
pub use lifecycle::{BulkDeliveryReport, DeliveryOutcome, NewOrder, OrderItem, OrderLifecycle};
pub use models::{
    Collector, CollectorStatus, GeoPoint, LabOrder, LabService, OrderEvent, OrderEventKind,
    OrderServiceLine, OrderStatus, Patient, Priority, ResultPayload, ResultStatus, TestResult,
};
pub use results::{ResultProgress, ResultRecorder};
pub use store::{CollectorFilter, EntityStore, OrderFilter};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LabOpsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Conflicting assignment: {0}")]
    ConflictingActiveAssignment(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CoreError> for LabOpsError {
    fn from(e: CoreError) -> Self {
        let message = e.to_string();
        match e {
            CoreError::NotFound { .. } => LabOpsError::NotFound(message),
            CoreError::InvalidTransition { .. } => LabOpsError::InvalidTransition(message),
            CoreError::ConflictingActiveAssignment { .. } => {
                LabOpsError::ConflictingActiveAssignment(message)
            }
            CoreError::ConcurrentModification { .. } => {
                LabOpsError::ConcurrentModification(message)
            }
            CoreError::Validation(_) => LabOpsError::Validation(message),
            CoreError::Store(_) => LabOpsError::Storage(message),
        }
    }
}

impl From<db::DbError> for LabOpsError {
    fn from(e: db::DbError) -> Self {
        LabOpsError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for LabOpsError {
    fn from(e: serde_json::Error) -> Self {
        LabOpsError::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for LabOpsError {
    fn from(e: config::ConfigError) -> Self {
        LabOpsError::Config(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for LabOpsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        LabOpsError::Storage(format!("Lock poisoned: {}", e))
    }
}

fn parse_field<T: FromStr<Err = String>>(value: &str) -> Result<T, LabOpsError> {
    value.parse().map_err(LabOpsError::Validation)
}

/// Counts cross the FFI as `u32`, saturating.
fn ffi_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<LabOpsCore>, LabOpsError> {
    let db = Database::open(&path)?;
    Ok(LabOpsCore::wrap(db, LabOpsConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<LabOpsCore>, LabOpsError> {
    let db = Database::open_in_memory()?;
    Ok(LabOpsCore::wrap(db, LabOpsConfig::default()))
}

/// Load configuration (optional file, then `LABOPS__*` environment), start
/// logging and open the configured database.
#[uniffi::export]
pub fn open_with_config(config_path: Option<String>) -> Result<Arc<LabOpsCore>, LabOpsError> {
    let path = config_path.map(PathBuf::from);
    let config = LabOpsConfig::load(path.as_deref())?;
    logging::init_from_config(&config);

    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    tracing::info!(database = ?config.database_path, "LabOps core opened");
    Ok(LabOpsCore::wrap(db, config))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct LabOpsCore {
    db: Arc<Mutex<Database>>,
    config: LabOpsConfig,
}

impl LabOpsCore {
    fn wrap(db: Database, config: LabOpsConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }
}

#[uniffi::export]
impl LabOpsCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add a lab service to the catalog.
    pub fn add_service(&self, service: FfiLabService) -> Result<(), LabOpsError> {
        let db = self.db.lock()?;
        db.insert_service(&service.into())?;
        Ok(())
    }

    /// List catalog services.
    pub fn list_services(&self, active_only: bool) -> Result<Vec<FfiLabService>, LabOpsError> {
        let db = self.db.lock()?;
        let services = db.list_catalog(active_only)?;
        Ok(services.into_iter().map(|s| s.into()).collect())
    }

    /// Typo-tolerant search over active services.
    pub fn search_services(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiServiceMatch>, LabOpsError> {
        let db = self.db.lock()?;
        let matches = CatalogSearch::new(&*db).search(&query, limit as usize)?;
        Ok(matches.into_iter().map(|m| m.into()).collect())
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create a new patient.
    pub fn create_patient(
        &self,
        name: String,
        national_id: String,
        phone: String,
        address: String,
    ) -> Result<FfiPatient, LabOpsError> {
        if name.trim().is_empty() || national_id.trim().is_empty() {
            return Err(LabOpsError::Validation(
                "patient name and national ID are required".into(),
            ));
        }
        let db = self.db.lock()?;
        let patient = Patient::new(name, national_id, phone, address);
        db.insert_patient(&patient)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, LabOpsError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&patient_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Search patients by name prefix or exact national ID.
    pub fn search_patients(&self, query: String, limit: u32) -> Result<Vec<FfiPatient>, LabOpsError> {
        let db = self.db.lock()?;
        let patients = db.search_patients(&query, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Update a patient's phone and address.
    pub fn update_patient_contact(
        &self,
        patient_id: String,
        phone: String,
        address: String,
    ) -> Result<(), LabOpsError> {
        let db = self.db.lock()?;
        if !db.update_patient_contact(&patient_id, &phone, &address)? {
            return Err(LabOpsError::NotFound(format!("Patient not found: {}", patient_id)));
        }
        Ok(())
    }

    // =========================================================================
    // Collector Operations
    // =========================================================================

    /// Register a new collector.
    pub fn register_collector(&self, name: String, phone: String) -> Result<FfiCollector, LabOpsError> {
        let db = self.db.lock()?;
        let collector = self.tracker(&db).register_collector(name, phone)?;
        Ok(collector.into())
    }

    /// List collectors, optionally by status.
    pub fn list_collectors(&self, status: Option<String>) -> Result<Vec<FfiCollector>, LabOpsError> {
        let filter = CollectorFilter {
            status: status.as_deref().map(parse_field).transpose()?,
            active_only: false,
        };
        let db = self.db.lock()?;
        let collectors = self.tracker(&db).list_collectors(&filter)?;
        Ok(collectors.into_iter().map(|c| c.into()).collect())
    }

    /// Set a collector's availability, optionally with a position fix.
    pub fn set_collector_status(
        &self,
        collector_id: String,
        status: String,
        location: Option<FfiGeoPoint>,
        force_release: bool,
    ) -> Result<FfiCollector, LabOpsError> {
        let status: CollectorStatus = parse_field(&status)?;
        let db = self.db.lock()?;
        let collector = self.tracker(&db).set_collector_status(
            &collector_id,
            status,
            location.map(Into::into),
            force_release,
        )?;
        Ok(collector.into())
    }

    /// Activate or deactivate a collector.
    pub fn set_collector_active(
        &self,
        collector_id: String,
        active: bool,
    ) -> Result<FfiCollector, LabOpsError> {
        let db = self.db.lock()?;
        let collector = self.tracker(&db).set_collector_active(&collector_id, active)?;
        Ok(collector.into())
    }

    /// Assign a collector to a registered order.
    pub fn assign_order(&self, order_id: String, collector_id: String) -> Result<FfiLabOrder, LabOpsError> {
        let db = self.db.lock()?;
        let order = self.tracker(&db).assign_order(&order_id, &collector_id)?;
        Ok(order.into())
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Register a new order.
    pub fn register_order(&self, order: FfiNewOrder) -> Result<FfiLabOrder, LabOpsError> {
        let new_order = NewOrder::try_from(order)?;
        let db = self.db.lock()?;
        let order = self.lifecycle(&db).register_order(new_order)?;
        Ok(order.into())
    }

    /// Get an order by ID.
    pub fn get_order(&self, order_id: String) -> Result<FfiLabOrder, LabOpsError> {
        let db = self.db.lock()?;
        let order = self.lifecycle(&db).get_order(&order_id)?;
        Ok(order.into())
    }

    /// List orders, optionally by status.
    pub fn list_orders(&self, status: Option<String>) -> Result<Vec<FfiLabOrder>, LabOpsError> {
        let filter = match status {
            Some(status) => OrderFilter::with_status(parse_field(&status)?),
            None => OrderFilter::all(),
        };
        let db = self.db.lock()?;
        let orders = self.lifecycle(&db).list_orders(&filter)?;
        Ok(orders.into_iter().map(|o| o.into()).collect())
    }

    /// Move an order to a target status.
    pub fn transition_order(&self, order_id: String, target: String) -> Result<FfiLabOrder, LabOpsError> {
        let target: OrderStatus = parse_field(&target)?;
        let db = self.db.lock()?;
        let order = self.lifecycle(&db).transition(&order_id, target)?;
        Ok(order.into())
    }

    /// Move an order one lifecycle step forward.
    pub fn advance_order(&self, order_id: String) -> Result<FfiLabOrder, LabOpsError> {
        let db = self.db.lock()?;
        let order = self.lifecycle(&db).advance(&order_id)?;
        Ok(order.into())
    }

    /// Cancel an order.
    pub fn cancel_order(&self, order_id: String) -> Result<FfiLabOrder, LabOpsError> {
        let db = self.db.lock()?;
        let order = self.lifecycle(&db).cancel(&order_id)?;
        Ok(order.into())
    }

    /// Deliver every completed order in the list, reporting per order.
    pub fn bulk_deliver(&self, order_ids: Vec<String>) -> Result<Vec<FfiDeliveryOutcome>, LabOpsError> {
        let db = self.db.lock()?;
        let report = self.lifecycle(&db).bulk_deliver(&order_ids);
        Ok(report.items.into_iter().map(|i| i.into()).collect())
    }

    /// Re-check an order's hash-chained history.
    pub fn verify_order_history(&self, order_id: String) -> Result<FfiHistoryVerification, LabOpsError> {
        let db = self.db.lock()?;
        let verification = self.lifecycle(&db).verify_history(&order_id)?;
        Ok(verification.into())
    }

    // =========================================================================
    // Result Operations
    // =========================================================================

    /// Create or update the result of one service line.
    pub fn record_result(
        &self,
        order_id: String,
        service_id: i64,
        payload: FfiResultPayload,
    ) -> Result<FfiTestResult, LabOpsError> {
        let payload = ResultPayload::try_from(payload)?;
        let db = self.db.lock()?;
        let result = ResultRecorder::new(&*db).record_result(&order_id, service_id, payload)?;
        Ok(result.into())
    }

    /// All results of an order.
    pub fn list_results(&self, order_id: String) -> Result<Vec<FfiTestResult>, LabOpsError> {
        let db = self.db.lock()?;
        let results = ResultRecorder::new(&*db).list_results(&order_id)?;
        Ok(results.into_iter().map(|r| r.into()).collect())
    }

    // =========================================================================
    // Analytics Operations
    // =========================================================================

    /// Statistics for the last `days` days (configured default when absent).
    pub fn compute_stats(&self, days: Option<u32>) -> Result<FfiStats, LabOpsError> {
        Ok(self.stats(days)?.into())
    }

    /// Statistics as JSON.
    pub fn export_stats_json(&self, days: Option<u32>) -> Result<String, LabOpsError> {
        Ok(self.stats(days)?.to_json()?)
    }

    /// Daily order series as CSV.
    pub fn export_daily_csv(&self, days: Option<u32>) -> Result<String, LabOpsError> {
        Ok(self.stats(days)?.daily_csv())
    }
}

impl LabOpsCore {
    fn tracker<'a>(&self, db: &'a Database) -> CollectorTracker<'a, Database> {
        CollectorTracker::with_sync_attempts(db, self.config.collector_sync_attempts)
    }

    fn lifecycle<'a>(&self, db: &'a Database) -> OrderLifecycle<'a, Database> {
        OrderLifecycle::with_sync_attempts(db, self.config.collector_sync_attempts)
    }

    fn stats(&self, days: Option<u32>) -> Result<Stats, LabOpsError> {
        let window = DateRange::last_days(
            chrono::Utc::now(),
            days.unwrap_or(self.config.default_window_days),
        );
        let db = self.db.lock()?;
        Ok(analytics::snapshot(&*db, &window)?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

const DATE_FORMAT: &str = "%Y-%m-%d";

/// FFI-safe catalog service.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLabService {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub sample_type: String,
    pub reference_range: Option<String>,
    pub unit: Option<String>,
    pub active: bool,
}

impl From<LabService> for FfiLabService {
    fn from(service: LabService) -> Self {
        Self {
            id: service.id,
            code: service.code,
            name: service.name,
            category: service.category,
            price: service.price,
            sample_type: service.sample_type,
            reference_range: service.reference_range,
            unit: service.unit,
            active: service.active,
        }
    }
}

impl From<FfiLabService> for LabService {
    fn from(service: FfiLabService) -> Self {
        LabService {
            id: service.id,
            code: service.code,
            name: service.name,
            category: service.category,
            price: service.price,
            sample_type: service.sample_type,
            reference_range: service.reference_range,
            unit: service.unit,
            active: service.active,
        }
    }
}

/// FFI-safe catalog search hit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiServiceMatch {
    pub service: FfiLabService,
    pub score: f64,
}

impl From<ServiceMatch> for FfiServiceMatch {
    fn from(m: ServiceMatch) -> Self {
        Self {
            service: m.service.into(),
            score: m.score,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub national_id: String,
    pub phone: String,
    pub address: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            national_id: patient.national_id,
            phone: patient.phone,
            address: patient.address,
        }
    }
}

/// FFI-safe position.
#[derive(Debug, Clone, Copy, uniffi::Record)]
pub struct FfiGeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<FfiGeoPoint> for GeoPoint {
    fn from(point: FfiGeoPoint) -> Self {
        GeoPoint {
            lat: point.lat,
            lng: point.lng,
        }
    }
}

impl From<GeoPoint> for FfiGeoPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            lat: point.lat,
            lng: point.lng,
        }
    }
}

/// FFI-safe collector.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCollector {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub status: String,
    pub is_active: bool,
    pub location: Option<FfiGeoPoint>,
    pub version: i64,
}

impl From<Collector> for FfiCollector {
    fn from(collector: Collector) -> Self {
        Self {
            id: collector.id,
            name: collector.name,
            phone: collector.phone,
            status: collector.status.to_string(),
            is_active: collector.is_active,
            location: collector.location.map(Into::into),
            version: collector.version,
        }
    }
}

/// FFI-safe requested service.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOrderItem {
    pub service_id: i64,
    pub quantity: u32,
}

/// FFI-safe order registration input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewOrder {
    pub patient_id: String,
    pub items: Vec<FfiOrderItem>,
    pub collection_address: Option<String>,
    /// `YYYY-MM-DD`
    pub scheduled_date: Option<String>,
    pub time_slot: Option<String>,
    /// `normal` (default) or `urgent`
    pub priority: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<FfiNewOrder> for NewOrder {
    type Error = LabOpsError;

    fn try_from(order: FfiNewOrder) -> Result<Self, Self::Error> {
        let scheduled_date = order
            .scheduled_date
            .as_deref()
            .map(|d| {
                NaiveDate::parse_from_str(d, DATE_FORMAT)
                    .map_err(|e| LabOpsError::Validation(format!("Invalid scheduled date {d}: {e}")))
            })
            .transpose()?;
        let priority = order
            .priority
            .as_deref()
            .map(parse_field)
            .transpose()?
            .unwrap_or_default();

        Ok(NewOrder {
            patient_id: order.patient_id,
            items: order
                .items
                .into_iter()
                .map(|i| OrderItem {
                    service_id: i.service_id,
                    quantity: i.quantity,
                })
                .collect(),
            collection_address: order.collection_address,
            scheduled_date,
            time_slot: order.time_slot,
            priority,
            notes: order.notes,
        })
    }
}

/// FFI-safe order line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOrderLine {
    pub service_id: i64,
    pub service_name: String,
    pub quantity: u32,
    pub price: i64,
}

/// FFI-safe lab order.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLabOrder {
    pub id: String,
    pub order_number: String,
    pub patient_id: String,
    pub collector_id: Option<String>,
    pub lines: Vec<FfiOrderLine>,
    pub total_amount: i64,
    pub scheduled_date: Option<String>,
    pub time_slot: Option<String>,
    pub collection_address: String,
    pub priority: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub version: i64,
}

impl From<LabOrder> for FfiLabOrder {
    fn from(order: LabOrder) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            patient_id: order.patient_id,
            collector_id: order.collector_id,
            lines: order
                .lines
                .into_iter()
                .map(|l| FfiOrderLine {
                    service_id: l.service_id,
                    service_name: l.service_name,
                    quantity: l.quantity,
                    price: l.price,
                })
                .collect(),
            total_amount: order.total_amount,
            scheduled_date: order.scheduled_date.map(|d| d.format(DATE_FORMAT).to_string()),
            time_slot: order.time_slot,
            collection_address: order.collection_address,
            priority: order.priority.as_str().to_string(),
            notes: order.notes,
            status: order.status.to_string(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
            version: order.version,
        }
    }
}

/// FFI-safe bulk delivery outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDeliveryOutcome {
    pub order_id: String,
    /// `delivered`, `already_delivered`, `skipped` or `failed`
    pub outcome: String,
    /// Order status after the attempt, when known
    pub status: Option<String>,
    pub error: Option<String>,
}

impl From<lifecycle::BulkDeliveryItem> for FfiDeliveryOutcome {
    fn from(item: lifecycle::BulkDeliveryItem) -> Self {
        let (outcome, status, error) = match item.outcome {
            DeliveryOutcome::Delivered(order) => ("delivered", Some(order.status.to_string()), None),
            DeliveryOutcome::AlreadyDelivered => (
                "already_delivered",
                Some(OrderStatus::Delivered.to_string()),
                None,
            ),
            DeliveryOutcome::Skipped { status } => ("skipped", Some(status.to_string()), None),
            DeliveryOutcome::Failed(err) => ("failed", None, Some(err.to_string())),
        };
        Self {
            order_id: item.order_id,
            outcome: outcome.to_string(),
            status,
            error,
        }
    }
}

/// FFI-safe result input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiResultPayload {
    pub value: String,
    pub normal_range: Option<String>,
    pub unit: Option<String>,
    /// `pending`, `completed`, `reviewed` or `validated`
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<FfiResultPayload> for ResultPayload {
    type Error = LabOpsError;

    fn try_from(payload: FfiResultPayload) -> Result<Self, Self::Error> {
        Ok(ResultPayload {
            value: payload.value,
            normal_range: payload.normal_range,
            unit: payload.unit,
            status: payload.status.as_deref().map(parse_field).transpose()?,
            notes: payload.notes,
        })
    }
}

/// FFI-safe test result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTestResult {
    pub id: String,
    pub order_id: String,
    pub service_id: i64,
    pub value: String,
    pub normal_range: Option<String>,
    pub unit: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub updated_at: String,
}

impl From<TestResult> for FfiTestResult {
    fn from(result: TestResult) -> Self {
        Self {
            id: result.id,
            order_id: result.order_id,
            service_id: result.service_id,
            value: result.value,
            normal_range: result.normal_range,
            unit: result.unit,
            status: result.status.to_string(),
            notes: result.notes,
            updated_at: result.updated_at.to_rfc3339(),
        }
    }
}

/// FFI-safe history check.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistoryVerification {
    pub event_count: u32,
    pub intact: bool,
    pub first_broken: Option<u32>,
}

impl From<HistoryVerification> for FfiHistoryVerification {
    fn from(v: HistoryVerification) -> Self {
        Self {
            event_count: ffi_count(v.event_count),
            intact: v.is_intact(),
            first_broken: v.first_broken,
        }
    }
}

/// FFI-safe status count.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStatusCount {
    pub status: String,
    pub count: u32,
}

/// FFI-safe daily point.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDailyPoint {
    pub date: String,
    pub orders: u32,
    pub revenue: i64,
}

/// FFI-safe collector performance row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCollectorPerformance {
    pub collector_id: String,
    pub name: String,
    pub orders_handled: u32,
    pub completed: u32,
    pub efficiency: f64,
}

/// FFI-safe statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStats {
    pub window_days: u32,
    pub total_orders: u32,
    pub delivered_orders: u32,
    pub completion_rate: f64,
    pub total_revenue: i64,
    pub avg_order_value: f64,
    pub status_distribution: Vec<FfiStatusCount>,
    pub daily_orders: Vec<FfiDailyPoint>,
    pub collector_performance: Vec<FfiCollectorPerformance>,
}

impl From<Stats> for FfiStats {
    fn from(stats: Stats) -> Self {
        Self {
            window_days: stats.window.days,
            total_orders: ffi_count(stats.total_orders),
            delivered_orders: ffi_count(stats.delivered_orders),
            completion_rate: stats.completion_rate,
            total_revenue: stats.total_revenue,
            avg_order_value: stats.avg_order_value,
            status_distribution: stats
                .status_distribution
                .into_iter()
                .map(|s| FfiStatusCount {
                    status: s.status.to_string(),
                    count: ffi_count(s.count),
                })
                .collect(),
            daily_orders: stats
                .daily_orders
                .into_iter()
                .map(|p| FfiDailyPoint {
                    date: p.date.format(DATE_FORMAT).to_string(),
                    orders: ffi_count(p.orders),
                    revenue: p.revenue,
                })
                .collect(),
            collector_performance: stats
                .collector_performance
                .into_iter()
                .map(|c| FfiCollectorPerformance {
                    collector_id: c.collector_id,
                    name: c.name,
                    orders_handled: ffi_count(c.orders_handled),
                    completed: ffi_count(c.completed),
                    efficiency: c.efficiency,
                })
                .collect(),
        }
    }
}
