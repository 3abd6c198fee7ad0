use chrono::{DateTime, Utc};
use tracing::instrument;

use ledge_core::disbursement::{Disbursement, DisbursementStatus};
use ledge_core::ids::{DisbursementId, LoanId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const DISB_COLUMNS: &str = "id, loan_id, sequence, status, requested_amount,
        approved_amount, disbursed_amount, request_date, work_completion_pct,
        created_at, updated_at";

pub struct DisbursementRepo {
    db: Database,
}

impl DisbursementRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(loan_id = %loan_id, sequence))]
    pub fn create(
        &self,
        loan_id: &LoanId,
        sequence: u32,
        requested_amount: f64,
        request_date: DateTime<Utc>,
    ) -> Result<Disbursement, StoreError> {
        let id = DisbursementId::new();
        let now = Utc::now();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO disbursements (id, loan_id, sequence, status, requested_amount,
                                            request_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'requested', ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.as_str(),
                    loan_id.as_str(),
                    sequence,
                    requested_amount,
                    request_date.to_rfc3339(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;

            Ok(Disbursement {
                id,
                loan_id: loan_id.clone(),
                sequence,
                status: DisbursementStatus::Requested,
                requested_amount,
                approved_amount: None,
                disbursed_amount: None,
                request_date,
                work_completion_pct: 0,
                created_at: now,
                updated_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(disbursement_id = %id))]
    pub fn get(&self, id: &DisbursementId) -> Result<Disbursement, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DISB_COLUMNS} FROM disbursements WHERE id = ?1"
            ))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_disbursement(row),
                None => Err(StoreError::NotFound(format!("disbursement {id}"))),
            }
        })
    }

    #[instrument(skip(self), fields(loan_id = %loan_id))]
    pub fn list_for_loan(&self, loan_id: &LoanId) -> Result<Vec<Disbursement>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DISB_COLUMNS} FROM disbursements WHERE loan_id = ?1
                 ORDER BY sequence ASC"
            ))?;
            let mut rows = stmt.query([loan_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_disbursement(row)?);
            }
            Ok(results)
        })
    }

    /// In-progress tranches whose owning loan is disbursing. Sweep query
    /// path for the work-delay rule.
    #[instrument(skip(self))]
    pub fn list_active_for_disbursing_loans(&self) -> Result<Vec<Disbursement>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.loan_id, d.sequence, d.status, d.requested_amount,
                        d.approved_amount, d.disbursed_amount, d.request_date,
                        d.work_completion_pct, d.created_at, d.updated_at
                 FROM disbursements d
                 JOIN loans l ON l.id = d.loan_id
                 WHERE d.status = 'in_progress' AND l.status = 'disbursing'
                 ORDER BY d.request_date ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_disbursement(row)?);
            }
            Ok(results)
        })
    }

    #[instrument(skip(self), fields(disbursement_id = %id, status = %status))]
    pub fn update_status(
        &self,
        id: &DisbursementId,
        status: DisbursementStatus,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE disbursements SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.to_string(), Utc::now().to_rfc3339(), id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("disbursement {id}")));
            }
            Ok(())
        })
    }

    /// Record site-verified work progress.
    #[instrument(skip(self), fields(disbursement_id = %id, pct))]
    pub fn update_progress(&self, id: &DisbursementId, pct: u8) -> Result<(), StoreError> {
        if pct > 100 {
            return Err(StoreError::Conflict(format!(
                "work completion {pct}% out of range"
            )));
        }
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE disbursements SET work_completion_pct = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![pct, Utc::now().to_rfc3339(), id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("disbursement {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_disbursement(row: &rusqlite::Row<'_>) -> Result<Disbursement, StoreError> {
    let status_raw: String = row_helpers::get(row, 3, "disbursements", "status")?;
    let request_raw: String = row_helpers::get(row, 7, "disbursements", "request_date")?;
    let created_raw: String = row_helpers::get(row, 9, "disbursements", "created_at")?;
    let updated_raw: String = row_helpers::get(row, 10, "disbursements", "updated_at")?;

    Ok(Disbursement {
        id: DisbursementId::from_raw(row_helpers::get::<String>(row, 0, "disbursements", "id")?),
        loan_id: LoanId::from_raw(row_helpers::get::<String>(row, 1, "disbursements", "loan_id")?),
        sequence: row_helpers::get(row, 2, "disbursements", "sequence")?,
        status: row_helpers::parse_enum(&status_raw, "disbursements", "status")?,
        requested_amount: row_helpers::get(row, 4, "disbursements", "requested_amount")?,
        approved_amount: row_helpers::get_opt(row, 5, "disbursements", "approved_amount")?,
        disbursed_amount: row_helpers::get_opt(row, 6, "disbursements", "disbursed_amount")?,
        request_date: row_helpers::parse_timestamp(&request_raw, "disbursements", "request_date")?,
        work_completion_pct: row_helpers::get(row, 8, "disbursements", "work_completion_pct")?,
        created_at: row_helpers::parse_timestamp(&created_raw, "disbursements", "created_at")?,
        updated_at: row_helpers::parse_timestamp(&updated_raw, "disbursements", "updated_at")?,
    })
}
