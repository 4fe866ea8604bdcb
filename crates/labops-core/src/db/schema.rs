//! SQLite schema definition.

/// Complete database schema for the lab-operations store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    national_id TEXT NOT NULL UNIQUE,
    phone TEXT NOT NULL,
    address TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- ============================================================================
-- Lab Service Catalog (reference data)
-- ============================================================================

CREATE TABLE IF NOT EXISTS lab_services (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    price INTEGER NOT NULL CHECK (price >= 0),
    sample_type TEXT NOT NULL,
    reference_range TEXT,
    unit TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

-- ============================================================================
-- Collectors
-- ============================================================================

CREATE TABLE IF NOT EXISTS collectors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('available', 'busy', 'offline')),
    is_active INTEGER NOT NULL DEFAULT 1,
    lat REAL,
    lng REAL,
    location_updated_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_collectors_status ON collectors(status);

-- ============================================================================
-- Lab Orders
-- ============================================================================

CREATE TABLE IF NOT EXISTS lab_orders (
    id TEXT PRIMARY KEY,
    order_number TEXT NOT NULL UNIQUE,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    collector_id TEXT REFERENCES collectors(id),
    lines TEXT NOT NULL DEFAULT '[]',            -- JSON array of OrderServiceLine
    total_amount INTEGER NOT NULL,
    scheduled_date TEXT,                         -- YYYY-MM-DD
    time_slot TEXT,
    collection_address TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'normal',
    notes TEXT,
    status TEXT NOT NULL CHECK (status IN (
        'registered', 'collection_scheduled', 'collected',
        'processing', 'completed', 'delivered', 'cancelled'
    )),
    created_at TEXT NOT NULL,                    -- fixed-width RFC 3339, sorts as time
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_orders_status ON lab_orders(status);
CREATE INDEX IF NOT EXISTS idx_orders_collector ON lab_orders(collector_id, status);
CREATE INDEX IF NOT EXISTS idx_orders_patient ON lab_orders(patient_id);
CREATE INDEX IF NOT EXISTS idx_orders_created ON lab_orders(created_at);

-- ============================================================================
-- Test Results (one per order/service pair)
-- ============================================================================

CREATE TABLE IF NOT EXISTS test_results (
    id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES lab_orders(id),
    service_id INTEGER NOT NULL,
    value TEXT NOT NULL,
    normal_range TEXT,
    unit TEXT,
    status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'reviewed', 'validated')),
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    UNIQUE (order_id, service_id)
);

-- ============================================================================
-- Order History (Append-Only, hash-chained per order)
-- ============================================================================

CREATE TABLE IF NOT EXISTS order_events (
    order_id TEXT NOT NULL REFERENCES lab_orders(id),
    sequence INTEGER NOT NULL CHECK (sequence >= 1),
    kind TEXT NOT NULL,                          -- JSON OrderEventKind
    recorded_at TEXT NOT NULL,
    prev_hash TEXT,
    hash TEXT NOT NULL,
    PRIMARY KEY (order_id, sequence)
);

CREATE TRIGGER IF NOT EXISTS order_events_no_update BEFORE UPDATE ON order_events
BEGIN
    SELECT RAISE(ABORT, 'Order history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS order_events_no_delete BEFORE DELETE ON order_events
BEGIN
    SELECT RAISE(ABORT, 'Order history is append-only');
END;
"#;
