use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, LoanId};

/// Mortgage product catalogue. Each variant carries its own validity window
/// and alert threshold so callers never inspect the name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    ClassicAcquirer,
    ClassicBuilder,
    RentalOrdinary,
    YoungLand,
}

impl LoanType {
    /// Days an offer stays open before expiring, counted from creation.
    pub fn validity_days(&self) -> i64 {
        match self {
            Self::ClassicAcquirer | Self::ClassicBuilder => 60,
            Self::RentalOrdinary | Self::YoungLand => 90,
        }
    }

    /// Days-remaining threshold below which the offer enters the orange
    /// warning window (two thirds of the validity window elapsed).
    pub fn warning_threshold_days(&self) -> i64 {
        match self {
            Self::ClassicAcquirer | Self::ClassicBuilder => 40,
            Self::RentalOrdinary | Self::YoungLand => 60,
        }
    }

    /// Product code used in loan numbers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClassicAcquirer => "541",
            Self::ClassicBuilder => "542",
            Self::RentalOrdinary => "567",
            Self::YoungLand => "571",
        }
    }
}

impl std::fmt::Display for LoanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassicAcquirer => write!(f, "classic_acquirer"),
            Self::ClassicBuilder => write!(f, "classic_builder"),
            Self::RentalOrdinary => write!(f, "rental_ordinary"),
            Self::YoungLand => write!(f, "young_land"),
        }
    }
}

impl std::str::FromStr for LoanType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic_acquirer" => Ok(Self::ClassicAcquirer),
            "classic_builder" => Ok(Self::ClassicBuilder),
            "rental_ordinary" => Ok(Self::RentalOrdinary),
            "young_land" => Ok(Self::YoungLand),
            other => Err(format!("unknown loan type: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Draft,
    Approved,
    InProgress,
    Disbursing,
    Completed,
    Cancelled,
    Suspended,
}

impl LoanStatus {
    /// Statuses whose offers are still running against the validity clock.
    pub fn validity_tracked(&self) -> bool {
        matches!(self, Self::Approved | Self::InProgress)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Approved => write!(f, "approved"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Disbursing => write!(f, "disbursing"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "approved" => Ok(Self::Approved),
            "in_progress" => Ok(Self::InProgress),
            "disbursing" => Ok(Self::Disbursing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown loan status: {other}")),
        }
    }
}

/// A mortgage-style loan dossier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub loan_number: String,
    pub client_id: ClientId,
    pub loan_type: LoanType,
    pub status: LoanStatus,
    /// Principal, in whole francs.
    pub amount: f64,
    pub duration_months: u32,
    pub grace_period_months: u32,
    /// Annual rate, percent.
    pub interest_rate: f64,
    pub monthly_payment: f64,
    pub approval_date: Option<DateTime<Utc>>,
    pub signature_date: Option<DateTime<Utc>>,
    pub first_payment_date: Option<DateTime<Utc>>,
    /// Offer expiry. Stamped at creation from the loan type's validity
    /// window; only the expiry cancellation path touches it afterwards.
    pub validity_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Standard annuity payment for a principal at an annual percentage rate
/// over a number of monthly installments. Zero-rate loans divide evenly.
pub fn monthly_payment(amount: f64, annual_rate_pct: f64, duration_months: u32) -> f64 {
    let n = duration_months as f64;
    let r = annual_rate_pct / 100.0 / 12.0;
    if r > 0.0 {
        amount * (r * (1.0 + r).powf(n)) / ((1.0 + r).powf(n) - 1.0)
    } else {
        amount / n
    }
}

/// Whole days from `earlier` to `later`, floor division. Negative when
/// `later` precedes `earlier`.
pub fn whole_days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(86_400)
}
