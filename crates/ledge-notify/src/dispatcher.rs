use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use ledge_core::ids::AlertId;
use ledge_store::alerts::AlertRepo;
use ledge_store::clients::ClientRepo;
use ledge_store::loans::LoanRepo;
use ledge_store::Database;

use crate::render::{self, Locale};
use crate::sink::{AlertNotification, NotificationSink};

/// Consumes alert ids enqueued by the sweep and pushes them through the
/// sink. Best-effort end to end: a missing row or an unreachable channel is
/// logged and the task moves on — the alert keeps its pending status and
/// false sent-flags, so an explicit resend can pick it up later.
pub fn start_dispatcher(
    db: Database,
    sink: Arc<dyn NotificationSink>,
    locale: Locale,
    mut rx: mpsc::Receiver<AlertId>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let alert_repo = AlertRepo::new(db.clone());
        let loan_repo = LoanRepo::new(db.clone());
        let client_repo = ClientRepo::new(db);

        while let Some(alert_id) = rx.recv().await {
            let note = match load_notification(&alert_repo, &loan_repo, &client_repo, &alert_id, locale) {
                Ok(note) => note,
                Err(e) => {
                    warn!(alert_id = %alert_id, error = %e, "notification dropped");
                    continue;
                }
            };

            let outcome = sink.dispatch(&note).await;
            info!(
                alert_id = %alert_id,
                sink = sink.name(),
                email = outcome.email,
                sms = outcome.sms,
                push = outcome.push,
                "alert dispatched"
            );

            if outcome.email || outcome.sms {
                if let Err(e) = alert_repo.mark_notified(&alert_id, outcome.email, outcome.sms) {
                    warn!(alert_id = %alert_id, error = %e, "failed to record sent flags");
                }
            }
        }
        info!("notification channel closed, dispatcher stopping");
    })
}

fn load_notification(
    alerts: &AlertRepo,
    loans: &LoanRepo,
    clients: &ClientRepo,
    alert_id: &AlertId,
    locale: Locale,
) -> Result<AlertNotification, ledge_store::StoreError> {
    let alert = alerts.get(alert_id)?;
    let loan = loans.get(&alert.loan_id)?;
    let client = clients.get(&loan.client_id)?;

    let subject = render::render_subject(&alert, locale);
    let email_body = render::render_email_body(&alert, &loan, &client, locale);
    let sms_body = render::render_sms_body(&alert, &loan, locale);

    Ok(AlertNotification {
        alert,
        loan,
        client,
        subject,
        email_body,
        sms_body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledge_core::alert::{AlertKind, Severity};
    use ledge_core::loan::LoanType;
    use ledge_store::loans::NewLoan;

    fn seeded_db() -> (Database, AlertId) {
        let db = Database::in_memory().unwrap();
        let client = ClientRepo::new(db.clone())
            .create("Aminata", "Ndiaye", Some("aminata@example.com"), Some("+237650000001"))
            .unwrap();
        let loan = LoanRepo::new(db.clone())
            .create(NewLoan {
                client_id: client.id,
                loan_type: LoanType::ClassicAcquirer,
                amount: 10_000_000.0,
                duration_months: 240,
                grace_period_months: 2,
                interest_rate: 5.0,
                agency: "102".to_string(),
            })
            .unwrap();
        let alert = AlertRepo::new(db.clone())
            .create(
                &loan.id,
                AlertKind::ValidityCritical,
                Severity::Red,
                "URGENT: L'offre de prêt expire dans 3 jours!",
                Utc::now(),
            )
            .unwrap();
        (db, alert.id)
    }

    #[tokio::test]
    async fn dispatch_stamps_sent_flags() {
        let (db, alert_id) = seeded_db();
        let (tx, rx) = mpsc::channel(16);

        let handle = start_dispatcher(db.clone(), Arc::new(crate::LogSink), Locale::Fr, rx);
        tx.send(alert_id.clone()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let alert = AlertRepo::new(db).get(&alert_id).unwrap();
        assert!(alert.email_sent);
        assert!(alert.sms_sent);
    }

    #[tokio::test]
    async fn unknown_alert_is_skipped_not_fatal() {
        let (db, alert_id) = seeded_db();
        let (tx, rx) = mpsc::channel(16);

        let handle = start_dispatcher(db.clone(), Arc::new(crate::LogSink), Locale::Fr, rx);
        tx.send(AlertId::from_raw("alrt_missing")).await.unwrap();
        tx.send(alert_id.clone()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        // The bad id was dropped, the real one still went through
        let alert = AlertRepo::new(db).get(&alert_id).unwrap();
        assert!(alert.email_sent);
    }

    #[test]
    fn load_notification_renders_bodies() {
        let (db, alert_id) = seeded_db();
        let alerts = AlertRepo::new(db.clone());
        let loans = LoanRepo::new(db.clone());
        let clients = ClientRepo::new(db);

        let note = load_notification(&alerts, &loans, &clients, &alert_id, Locale::Fr).unwrap();
        assert!(note.email_body.contains("Aminata Ndiaye"));
        assert!(note.email_body.contains(&note.loan.loan_number));
        assert!(note.sms_body.contains("RED"));
    }
}
