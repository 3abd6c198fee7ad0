use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DisbursementId, LoanId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    Requested,
    Approved,
    InProgress,
    Completed,
    Rejected,
    Suspended,
}

impl std::fmt::Display for DisbursementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::Approved => write!(f, "approved"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for DisbursementStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(Self::Requested),
            "approved" => Ok(Self::Approved),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown disbursement status: {other}")),
        }
    }
}

/// A tranche: partial release of loan funds tied to verified work progress.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Disbursement {
    pub id: DisbursementId,
    pub loan_id: LoanId,
    /// 1st, 2nd, ... tranche of the loan.
    pub sequence: u32,
    pub status: DisbursementStatus,
    pub requested_amount: f64,
    pub approved_amount: Option<f64>,
    pub disbursed_amount: Option<f64>,
    pub request_date: DateTime<Utc>,
    /// Site-verified completion of the funded works, 0..=100.
    pub work_completion_pct: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
