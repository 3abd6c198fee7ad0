use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ledge_core::alert::{Alert, AlertKind, AlertStatus, Severity};
use ledge_core::ids::{AlertId, LoanId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const ALERT_COLUMNS: &str = "id, loan_id, kind, severity, message, status,
        triggered_at, acknowledged_at, resolved_at, email_sent, sms_sent";

/// Counts of open (pending/acknowledged) alerts, for the operator dashboard.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: i64,
    pub red: i64,
    pub orange: i64,
    pub by_kind: HashMap<String, i64>,
    pub by_status: HashMap<String, i64>,
}

pub struct AlertRepo {
    db: Database,
}

impl AlertRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new alert with status pending and both sent-flags false.
    /// A second open alert of the same (loan, kind) violates the dedup
    /// index and surfaces as Conflict.
    #[instrument(skip(self, message), fields(loan_id = %loan_id, kind = %kind, severity = %severity))]
    pub fn create(
        &self,
        loan_id: &LoanId,
        kind: AlertKind,
        severity: Severity,
        message: &str,
        triggered_at: DateTime<Utc>,
    ) -> Result<Alert, StoreError> {
        let id = AlertId::new();

        self.db.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO alerts (id, loan_id, kind, severity, message, status, triggered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
                rusqlite::params![
                    id.as_str(),
                    loan_id.as_str(),
                    kind.to_string(),
                    severity.to_string(),
                    message,
                    triggered_at.to_rfc3339(),
                ],
            );

            match result {
                Ok(_) => Ok(Alert {
                    id,
                    loan_id: loan_id.clone(),
                    kind,
                    severity,
                    message: message.to_string(),
                    status: AlertStatus::Pending,
                    triggered_at,
                    acknowledged_at: None,
                    resolved_at: None,
                    email_sent: false,
                    sms_sent: false,
                }),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Conflict(format!(
                        "open {kind} alert already exists for loan {loan_id}"
                    )))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Deduplication probe: any alert of this kind for this loan whose
    /// status is not resolved.
    #[instrument(skip(self), fields(loan_id = %loan_id, kind = %kind))]
    pub fn find_unresolved(
        &self,
        loan_id: &LoanId,
        kind: AlertKind,
    ) -> Result<Option<Alert>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts
                 WHERE loan_id = ?1 AND kind = ?2 AND status != 'resolved'
                 LIMIT 1"
            ))?;
            let mut rows = stmt.query(rusqlite::params![loan_id.as_str(), kind.to_string()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_alert(row)?)),
                None => Ok(None),
            }
        })
    }

    #[instrument(skip(self), fields(alert_id = %id))]
    pub fn get(&self, id: &AlertId) -> Result<Alert, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_alert(row),
                None => Err(StoreError::NotFound(format!("alert {id}"))),
            }
        })
    }

    /// List alerts, newest trigger first, optionally filtered by status.
    #[instrument(skip(self))]
    pub fn list(
        &self,
        status: Option<AlertStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Alert>, StoreError> {
        self.db.with_conn(|conn| {
            let mut results = Vec::new();
            match status {
                Some(s) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ALERT_COLUMNS} FROM alerts WHERE status = ?1
                         ORDER BY triggered_at DESC LIMIT ?2 OFFSET ?3"
                    ))?;
                    let mut rows =
                        stmt.query(rusqlite::params![s.to_string(), limit, offset])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_alert(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ALERT_COLUMNS} FROM alerts
                         ORDER BY triggered_at DESC LIMIT ?1 OFFSET ?2"
                    ))?;
                    let mut rows = stmt.query(rusqlite::params![limit, offset])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_alert(row)?);
                    }
                }
            }
            Ok(results)
        })
    }

    #[instrument(skip(self), fields(loan_id = %loan_id))]
    pub fn list_for_loan(&self, loan_id: &LoanId) -> Result<Vec<Alert>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts WHERE loan_id = ?1
                 ORDER BY triggered_at DESC"
            ))?;
            let mut rows = stmt.query([loan_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_alert(row)?);
            }
            Ok(results)
        })
    }

    /// Operator acknowledgement; stamps acknowledged_at.
    #[instrument(skip(self), fields(alert_id = %id))]
    pub fn acknowledge(&self, id: &AlertId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE alerts SET status = 'acknowledged', acknowledged_at = ?1 WHERE id = ?2",
                rusqlite::params![at.to_rfc3339(), id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("alert {id}")));
            }
            Ok(())
        })
    }

    /// Operator resolution; stamps resolved_at and releases the dedup slot.
    #[instrument(skip(self), fields(alert_id = %id))]
    pub fn resolve(&self, id: &AlertId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE alerts SET status = 'resolved', resolved_at = ?1 WHERE id = ?2",
                rusqlite::params![at.to_rfc3339(), id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("alert {id}")));
            }
            Ok(())
        })
    }

    #[instrument(skip(self), fields(alert_id = %id))]
    pub fn escalate(&self, id: &AlertId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE alerts SET status = 'escalated' WHERE id = ?1",
                [id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("alert {id}")));
            }
            Ok(())
        })
    }

    /// Record which channels a dispatch attempt reached.
    #[instrument(skip(self), fields(alert_id = %id, email, sms))]
    pub fn mark_notified(&self, id: &AlertId, email: bool, sms: bool) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE alerts SET email_sent = email_sent OR ?1, sms_sent = sms_sent OR ?2
                 WHERE id = ?3",
                rusqlite::params![email, sms, id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("alert {id}")));
            }
            Ok(())
        })
    }

    /// Counts of open alerts for the dashboard.
    #[instrument(skip(self))]
    pub fn summary(&self) -> Result<AlertSummary, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, severity, status, COUNT(*) FROM alerts
                 WHERE status IN ('pending', 'acknowledged')
                 GROUP BY kind, severity, status",
            )?;
            let mut rows = stmt.query([])?;

            let mut summary = AlertSummary::default();
            while let Some(row) = rows.next()? {
                let kind: String = row_helpers::get(row, 0, "alerts", "kind")?;
                let severity: String = row_helpers::get(row, 1, "alerts", "severity")?;
                let status: String = row_helpers::get(row, 2, "alerts", "status")?;
                let count: i64 = row_helpers::get(row, 3, "alerts", "count")?;

                summary.total += count;
                match severity.as_str() {
                    "RED" => summary.red += count,
                    "ORANGE" => summary.orange += count,
                    _ => {}
                }
                *summary.by_kind.entry(kind).or_insert(0) += count;
                *summary.by_status.entry(status).or_insert(0) += count;
            }
            Ok(summary)
        })
    }
}

fn row_to_alert(row: &rusqlite::Row<'_>) -> Result<Alert, StoreError> {
    let kind_raw: String = row_helpers::get(row, 2, "alerts", "kind")?;
    let severity_raw: String = row_helpers::get(row, 3, "alerts", "severity")?;
    let status_raw: String = row_helpers::get(row, 5, "alerts", "status")?;
    let triggered_raw: String = row_helpers::get(row, 6, "alerts", "triggered_at")?;

    Ok(Alert {
        id: AlertId::from_raw(row_helpers::get::<String>(row, 0, "alerts", "id")?),
        loan_id: LoanId::from_raw(row_helpers::get::<String>(row, 1, "alerts", "loan_id")?),
        kind: row_helpers::parse_enum(&kind_raw, "alerts", "kind")?,
        severity: row_helpers::parse_enum(&severity_raw, "alerts", "severity")?,
        message: row_helpers::get(row, 4, "alerts", "message")?,
        status: row_helpers::parse_enum(&status_raw, "alerts", "status")?,
        triggered_at: row_helpers::parse_timestamp(&triggered_raw, "alerts", "triggered_at")?,
        acknowledged_at: row_helpers::parse_timestamp_opt(
            row_helpers::get_opt(row, 7, "alerts", "acknowledged_at")?,
            "alerts",
            "acknowledged_at",
        )?,
        resolved_at: row_helpers::parse_timestamp_opt(
            row_helpers::get_opt(row, 8, "alerts", "resolved_at")?,
            "alerts",
            "resolved_at",
        )?,
        email_sent: row_helpers::get(row, 9, "alerts", "email_sent")?,
        sms_sent: row_helpers::get(row, 10, "alerts", "sms_sent")?,
    })
}
