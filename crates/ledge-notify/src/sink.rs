use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ledge_core::alert::Alert;
use ledge_core::client::Client;
use ledge_core::loan::Loan;

/// Everything a channel needs to deliver one alert: the alert row plus the
/// dossier and borrower it concerns, and the pre-rendered bodies.
#[derive(Clone, Debug)]
pub struct AlertNotification {
    pub alert: Alert,
    pub loan: Loan,
    pub client: Client,
    pub subject: String,
    pub email_body: String,
    pub sms_body: String,
}

/// Which channels a dispatch attempt actually reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
}

/// Delivery seam. Implementations are best-effort: failures are reported
/// through the outcome (or logged), never as errors that reach the sweep.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn dispatch(&self, note: &AlertNotification) -> DispatchOutcome;
}
