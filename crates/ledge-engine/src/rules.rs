//! Threshold rules mapping a loan or tranche snapshot plus the sweep
//! instant to at most one candidate alert each. Pure functions; day counts
//! are whole-day floors, exclusive at zero and inclusive at the upper
//! threshold.

use chrono::{DateTime, Duration, Utc};

use ledge_core::alert::{AlertCandidate, AlertKind, AlertReason, Severity};
use ledge_core::disbursement::{Disbursement, DisbursementStatus};
use ledge_core::ids::LoanId;
use ledge_core::loan::{whole_days_between, Loan};

/// Days remaining at or below which a validity alert turns red.
const VALIDITY_RED_DAYS: i64 = 5;
/// Expected work progress per elapsed day, percentage points.
const EXPECTED_PROGRESS_PER_DAY: i64 = 3;
/// Tolerated shortfall before a work-delay alert fires, percentage points.
const WORK_DELAY_TOLERANCE_PCT: i64 = 20;
/// Repayment windows, days before the grace period ends.
const REPAYMENT_RED_DAYS: i64 = 7;
const REPAYMENT_ORANGE_DAYS: i64 = 30;
/// Contractual month used for grace-period arithmetic.
const DAYS_PER_MONTH: i64 = 30;

/// A row missing a field the rule needs. The sweep logs and skips these.
#[derive(Debug, thiserror::Error)]
#[error("loan {loan_id} missing {field}")]
pub struct MissingField {
    pub loan_id: LoanId,
    pub field: &'static str,
}

/// Offer-expiry rule for loans whose offer clock is running
/// (approved / in progress).
///
/// Expired offers (zero or negative days remaining) produce nothing here:
/// cancellation is the validity check's side effect, not the sweep's.
pub fn evaluate_validity(
    loan: &Loan,
    now: DateTime<Utc>,
) -> Result<Option<AlertCandidate>, MissingField> {
    if !loan.status.validity_tracked() {
        return Ok(None);
    }

    let validity_end = loan.validity_end.ok_or(MissingField {
        loan_id: loan.id.clone(),
        field: "validity_end",
    })?;

    let days_remaining = whole_days_between(validity_end, now);
    let reason = AlertReason::OfferExpiring { days_remaining };

    let candidate = if days_remaining > 0 && days_remaining <= VALIDITY_RED_DAYS {
        Some(AlertCandidate {
            loan_id: loan.id.clone(),
            kind: AlertKind::ValidityCritical,
            severity: Severity::Red,
            reason,
        })
    } else if days_remaining > VALIDITY_RED_DAYS
        && days_remaining <= loan.loan_type.warning_threshold_days()
    {
        Some(AlertCandidate {
            loan_id: loan.id.clone(),
            kind: AlertKind::ValidityWarning,
            severity: Severity::Orange,
            reason,
        })
    } else {
        None
    };

    Ok(candidate)
}

/// Work-delay rule for in-progress tranches of disbursing loans. Expected
/// completion accrues at 3 %/day capped at 100; a shortfall of more than
/// 20 points fires.
pub fn evaluate_work_delay(disbursement: &Disbursement, now: DateTime<Utc>) -> Option<AlertCandidate> {
    if disbursement.status != DisbursementStatus::InProgress {
        return None;
    }

    let days_elapsed = whole_days_between(now, disbursement.request_date);
    let expected = (days_elapsed * EXPECTED_PROGRESS_PER_DAY).clamp(0, 100);
    let actual = i64::from(disbursement.work_completion_pct);

    if expected - actual > WORK_DELAY_TOLERANCE_PCT {
        Some(AlertCandidate {
            loan_id: disbursement.loan_id.clone(),
            kind: AlertKind::WorkDelayWarning,
            severity: Severity::Orange,
            reason: AlertReason::WorkBehindSchedule {
                completion_pct: disbursement.work_completion_pct,
                expected_pct: expected as u8,
            },
        })
    } else {
        None
    }
}

/// Repayment rule for disbursing loans with a grace period and a known
/// first payment date. The imminent (red) window is checked before the
/// upcoming (orange) one.
pub fn evaluate_repayment(loan: &Loan, now: DateTime<Utc>) -> Option<AlertCandidate> {
    if loan.grace_period_months == 0 {
        return None;
    }
    let first_payment = loan.first_payment_date?;

    let grace_end =
        first_payment + Duration::days(DAYS_PER_MONTH * i64::from(loan.grace_period_months));
    let days_until_payment = whole_days_between(grace_end, now);
    let reason = AlertReason::RepaymentDue { days_until_payment };

    if days_until_payment > 0 && days_until_payment <= REPAYMENT_RED_DAYS {
        Some(AlertCandidate {
            loan_id: loan.id.clone(),
            kind: AlertKind::RepaymentImminent,
            severity: Severity::Red,
            reason,
        })
    } else if days_until_payment > REPAYMENT_RED_DAYS
        && days_until_payment <= REPAYMENT_ORANGE_DAYS
    {
        Some(AlertCandidate {
            loan_id: loan.id.clone(),
            kind: AlertKind::RepaymentUpcoming,
            severity: Severity::Orange,
            reason,
        })
    } else {
        None
    }
}
