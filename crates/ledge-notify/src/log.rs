use async_trait::async_trait;
use tracing::info;

use crate::sink::{AlertNotification, DispatchOutcome, NotificationSink};

/// Default sink: logs what would be delivered instead of delivering it.
/// Real SMTP/SMS gateways plug in behind the same trait. A channel is only
/// "sent" when the client has the matching contact detail on file.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn dispatch(&self, note: &AlertNotification) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        if let Some(email) = &note.client.email {
            info!(
                alert_id = %note.alert.id,
                to = %email,
                subject = %note.subject,
                "email notification"
            );
            outcome.email = true;
        }

        if let Some(phone) = &note.client.phone {
            info!(
                alert_id = %note.alert.id,
                to = %phone,
                body = %note.sms_body,
                "sms notification"
            );
            outcome.sms = true;
        }

        info!(
            alert_id = %note.alert.id,
            client_id = %note.client.id,
            message = %note.alert.message,
            "push notification"
        );
        outcome.push = true;

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledge_core::alert::{Alert, AlertKind, AlertStatus, Severity};
    use ledge_core::client::Client;
    use ledge_core::ids::{AlertId, ClientId, LoanId};
    use ledge_core::loan::{Loan, LoanStatus, LoanType};

    fn fixture() -> AlertNotification {
        let now = Utc::now();
        let loan_id = LoanId::new();
        let client_id = ClientId::new();
        AlertNotification {
            alert: Alert {
                id: AlertId::new(),
                loan_id: loan_id.clone(),
                kind: AlertKind::ValidityWarning,
                severity: Severity::Orange,
                message: "test".into(),
                status: AlertStatus::Pending,
                triggered_at: now,
                acknowledged_at: None,
                resolved_at: None,
                email_sent: false,
                sms_sent: false,
            },
            loan: Loan {
                id: loan_id,
                loan_number: "2026/102/0000001/541".into(),
                client_id: client_id.clone(),
                loan_type: LoanType::ClassicAcquirer,
                status: LoanStatus::Approved,
                amount: 10_000_000.0,
                duration_months: 240,
                grace_period_months: 2,
                interest_rate: 5.0,
                monthly_payment: 65_996.0,
                approval_date: None,
                signature_date: None,
                first_payment_date: None,
                validity_end: Some(now),
                created_at: now,
                updated_at: now,
            },
            client: Client {
                id: client_id,
                first_name: "Test".into(),
                last_name: "Client".into(),
                email: Some("client@example.com".into()),
                phone: None,
                created_at: now,
            },
            subject: "subject".into(),
            email_body: "body".into(),
            sms_body: "sms".into(),
        }
    }

    #[tokio::test]
    async fn outcome_follows_contact_details() {
        let sink = LogSink;
        let mut note = fixture();

        let outcome = sink.dispatch(&note).await;
        assert!(outcome.email);
        assert!(!outcome.sms);
        assert!(outcome.push);

        note.client.email = None;
        note.client.phone = Some("+237650000001".into());
        let outcome = sink.dispatch(&note).await;
        assert!(!outcome.email);
        assert!(outcome.sms);
    }
}
