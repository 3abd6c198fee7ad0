pub mod alert;
pub mod client;
pub mod disbursement;
pub mod ids;
pub mod loan;

pub use alert::{Alert, AlertCandidate, AlertKind, AlertReason, AlertStatus, Severity};
pub use disbursement::{Disbursement, DisbursementStatus};
pub use loan::{Loan, LoanStatus, LoanType};
