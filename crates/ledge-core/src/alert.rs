use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AlertId, LoanId};

/// Closed vocabulary of alert conditions. The sweep produces the first six;
/// the document kinds are raised by operator tooling against the same table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ValidityWarning,
    ValidityCritical,
    WorkDelayWarning,
    WorkDelayCritical,
    RepaymentUpcoming,
    RepaymentImminent,
    MissingDocument,
    DocumentExpiry,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ValidityWarning => "validity_warning",
            Self::ValidityCritical => "validity_critical",
            Self::WorkDelayWarning => "work_delay_warning",
            Self::WorkDelayCritical => "work_delay_critical",
            Self::RepaymentUpcoming => "repayment_upcoming",
            Self::RepaymentImminent => "repayment_imminent",
            Self::MissingDocument => "missing_document",
            Self::DocumentExpiry => "document_expiry",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validity_warning" => Ok(Self::ValidityWarning),
            "validity_critical" => Ok(Self::ValidityCritical),
            "work_delay_warning" => Ok(Self::WorkDelayWarning),
            "work_delay_critical" => Ok(Self::WorkDelayCritical),
            "repayment_upcoming" => Ok(Self::RepaymentUpcoming),
            "repayment_imminent" => Ok(Self::RepaymentImminent),
            "missing_document" => Ok(Self::MissingDocument),
            "document_expiry" => Ok(Self::DocumentExpiry),
            other => Err(format!("unknown alert kind: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Red,
    Orange,
    Green,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Red => write!(f, "RED"),
            Self::Orange => write!(f, "ORANGE"),
            Self::Green => write!(f, "GREEN"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RED" => Ok(Self::Red),
            "ORANGE" => Ok(Self::Orange),
            "GREEN" => Ok(Self::Green),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Resolved,
    Escalated,
}

impl AlertStatus {
    /// Unresolved alerts suppress re-creation of the same kind for a loan.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Resolved => write!(f, "resolved"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            "escalated" => Ok(Self::Escalated),
            other => Err(format!("unknown alert status: {other}")),
        }
    }
}

/// A persisted alert row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub loan_id: LoanId,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub email_sent: bool,
    pub sms_sent: bool,
}

/// Structured trigger data attached to a candidate. The rule evaluator
/// stays locale-agnostic; rendering to text happens at the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertReason {
    OfferExpiring { days_remaining: i64 },
    WorkBehindSchedule { completion_pct: u8, expected_pct: u8 },
    RepaymentDue { days_until_payment: i64 },
}

/// What a rule emits before deduplication and persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub loan_id: LoanId,
    pub kind: AlertKind,
    pub severity: Severity,
    pub reason: AlertReason,
}
