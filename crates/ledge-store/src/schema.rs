/// SQL DDL for the ledge database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS loans (
    id TEXT PRIMARY KEY,
    loan_number TEXT NOT NULL UNIQUE,
    client_id TEXT NOT NULL REFERENCES clients(id),
    loan_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    amount REAL NOT NULL,
    duration_months INTEGER NOT NULL,
    grace_period_months INTEGER NOT NULL DEFAULT 0,
    interest_rate REAL NOT NULL,
    monthly_payment REAL NOT NULL,
    approval_date TEXT,
    signature_date TEXT,
    first_payment_date TEXT,
    validity_end TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS disbursements (
    id TEXT PRIMARY KEY,
    loan_id TEXT NOT NULL REFERENCES loans(id),
    sequence INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'requested',
    requested_amount REAL NOT NULL,
    approved_amount REAL,
    disbursed_amount REAL,
    request_date TEXT NOT NULL,
    work_completion_pct INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    loan_id TEXT NOT NULL REFERENCES loans(id),
    kind TEXT NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    triggered_at TEXT NOT NULL,
    acknowledged_at TEXT,
    resolved_at TEXT,
    email_sent INTEGER NOT NULL DEFAULT 0,
    sms_sent INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_loans_status ON loans(status);
CREATE INDEX IF NOT EXISTS idx_loans_client ON loans(client_id);
CREATE INDEX IF NOT EXISTS idx_disbursements_loan ON disbursements(loan_id);
CREATE INDEX IF NOT EXISTS idx_disbursements_status ON disbursements(status);
CREATE INDEX IF NOT EXISTS idx_alerts_loan ON alerts(loan_id);
CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);

-- Backstop for the sweep's deduplication invariant: at most one open
-- alert per (loan, kind), even if two sweeps ever overlap.
CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_open_dedup
    ON alerts(loan_id, kind) WHERE status != 'resolved';

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
