use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use ledge_core::ids::LoanId;
use ledge_core::loan::{whole_days_between, LoanStatus};
use ledge_store::loans::LoanRepo;

use crate::error::EngineError;

/// Outcome of a loan-level validity check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidityReport {
    pub loan_id: LoanId,
    pub status: ValidityStatus,
    pub days_remaining: Option<i64>,
    pub validity_end: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Valid,
    Expired,
    /// Statuses where the offer clock is not running (draft, disbursing, ...).
    NotTracked,
}

/// Check one loan's offer validity. Expiring a tracked loan cancels it —
/// the one place the sweep's validity rule defers to.
#[instrument(skip(loans), fields(loan_id = %loan_id))]
pub fn check_loan_validity(
    loans: &LoanRepo,
    loan_id: &LoanId,
    now: DateTime<Utc>,
) -> Result<ValidityReport, EngineError> {
    let loan = loans.get(loan_id)?;

    if !loan.status.validity_tracked() {
        return Ok(ValidityReport {
            loan_id: loan.id,
            status: ValidityStatus::NotTracked,
            days_remaining: None,
            validity_end: loan.validity_end,
        });
    }

    let validity_end = loan.validity_end.ok_or_else(|| {
        EngineError::Internal(format!("loan {loan_id} has no validity end"))
    })?;
    let days_remaining = whole_days_between(validity_end, now);

    if days_remaining <= 0 {
        loans.update_status(&loan.id, LoanStatus::Cancelled)?;
        info!(loan_id = %loan.id, "offer expired, loan cancelled");
        return Ok(ValidityReport {
            loan_id: loan.id,
            status: ValidityStatus::Expired,
            days_remaining: Some(days_remaining),
            validity_end: Some(validity_end),
        });
    }

    Ok(ValidityReport {
        loan_id: loan.id,
        status: ValidityStatus::Valid,
        days_remaining: Some(days_remaining),
        validity_end: Some(validity_end),
    })
}
