use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use ledge_core::alert::AlertCandidate;
use ledge_core::ids::AlertId;
use ledge_core::loan::LoanStatus;
use ledge_notify::render::{render_message, Locale};
use ledge_store::alerts::AlertRepo;
use ledge_store::disbursements::DisbursementRepo;
use ledge_store::loans::LoanRepo;
use ledge_store::{Database, StoreError};

use crate::error::EngineError;
use crate::rules;

/// Tallies from one sweep pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub loans_checked: u32,
    pub disbursements_checked: u32,
    pub candidates: u32,
    pub created: u32,
    pub suppressed: u32,
    pub skipped: u32,
}

/// Drives one full evaluation pass: load the in-scope rows, run the rules,
/// deduplicate, persist, enqueue dispatch. One instance at a time is
/// assumed (the trigger's job); the store's dedup index holds the line if
/// that assumption breaks.
pub struct SweepRunner {
    loan_repo: LoanRepo,
    disbursement_repo: DisbursementRepo,
    alert_repo: AlertRepo,
    dispatch_tx: mpsc::Sender<AlertId>,
    locale: Locale,
}

impl SweepRunner {
    pub fn new(db: Database, dispatch_tx: mpsc::Sender<AlertId>, locale: Locale) -> Self {
        Self {
            loan_repo: LoanRepo::new(db.clone()),
            disbursement_repo: DisbursementRepo::new(db.clone()),
            alert_repo: AlertRepo::new(db),
            dispatch_tx,
            locale,
        }
    }

    /// One sweep at the given instant. Data errors on individual rows are
    /// logged and skipped; a store failure aborts and is the trigger's cue
    /// to retry.
    #[instrument(skip(self), fields(now = %now))]
    pub fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let mut report = SweepReport::default();

        // 1. Offer validity for loans whose offer clock is running.
        let tracked = self
            .loan_repo
            .list_by_statuses(&[LoanStatus::Approved, LoanStatus::InProgress])?;
        for loan in &tracked {
            report.loans_checked += 1;
            match rules::evaluate_validity(loan, now) {
                Ok(Some(candidate)) => self.commit(candidate, now, &mut report)?,
                Ok(None) => {}
                Err(e) => {
                    warn!(loan_id = %loan.id, error = %e, "loan skipped");
                    report.skipped += 1;
                }
            }
        }

        // 2. Work progress on active tranches of disbursing loans.
        let active = self.disbursement_repo.list_active_for_disbursing_loans()?;
        for disbursement in &active {
            report.disbursements_checked += 1;
            if let Some(candidate) = rules::evaluate_work_delay(disbursement, now) {
                self.commit(candidate, now, &mut report)?;
            }
        }

        // 3. Grace periods running out on disbursing loans.
        let watch = self.loan_repo.list_repayment_watch()?;
        for loan in &watch {
            report.loans_checked += 1;
            if let Some(candidate) = rules::evaluate_repayment(loan, now) {
                self.commit(candidate, now, &mut report)?;
            }
        }

        info!(
            loans = report.loans_checked,
            disbursements = report.disbursements_checked,
            candidates = report.candidates,
            created = report.created,
            suppressed = report.suppressed,
            skipped = report.skipped,
            "sweep complete"
        );
        Ok(report)
    }

    /// Deduplicate, persist, enqueue. An existing unresolved alert of the
    /// same (loan, kind) suppresses the candidate outright — its message
    /// and severity are left as they were.
    fn commit(
        &self,
        candidate: AlertCandidate,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        report.candidates += 1;

        if self
            .alert_repo
            .find_unresolved(&candidate.loan_id, candidate.kind)?
            .is_some()
        {
            report.suppressed += 1;
            return Ok(());
        }

        let message = render_message(candidate.kind, &candidate.reason, self.locale);
        match self.alert_repo.create(
            &candidate.loan_id,
            candidate.kind,
            candidate.severity,
            &message,
            now,
        ) {
            Ok(alert) => {
                report.created += 1;
                info!(alert_id = %alert.id, loan_id = %alert.loan_id, kind = %alert.kind, "alert created");
                if let Err(e) = self.dispatch_tx.try_send(alert.id.clone()) {
                    // Persistence stands; delivery is best-effort.
                    warn!(alert_id = %alert.id, error = %e, "notification enqueue failed");
                }
            }
            // Lost a race past the probe; the dedup index kept the invariant.
            Err(StoreError::Conflict(_)) => report.suppressed += 1,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ledge_core::alert::{AlertKind, AlertStatus, Severity};
    use ledge_core::disbursement::DisbursementStatus;
    use ledge_core::ids::LoanId;
    use ledge_core::loan::LoanType;
    use ledge_store::clients::ClientRepo;
    use ledge_store::loans::NewLoan;

    struct Fixture {
        db: Database,
        runner: SweepRunner,
        rx: mpsc::Receiver<AlertId>,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().unwrap();
        let (tx, rx) = mpsc::channel(64);
        let runner = SweepRunner::new(db.clone(), tx, Locale::Fr);
        Fixture { db, runner, rx }
    }

    fn make_loan(db: &Database, loan_type: LoanType, status: LoanStatus) -> LoanId {
        let client = ClientRepo::new(db.clone())
            .create("Test", "Client", Some("c@example.com"), None)
            .unwrap();
        let repo = LoanRepo::new(db.clone());
        let loan = repo
            .create(NewLoan {
                client_id: client.id,
                loan_type,
                amount: 10_000_000.0,
                duration_months: 240,
                grace_period_months: 1,
                interest_rate: 5.0,
                agency: "102".to_string(),
            })
            .unwrap();
        repo.update_status(&loan.id, status).unwrap();
        loan.id
    }

    fn set_validity_end(db: &Database, loan_id: &LoanId, at: DateTime<Utc>) {
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE loans SET validity_end = ?1 WHERE id = ?2",
                rusqlite::params![at.to_rfc3339(), loan_id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn clear_validity_end(db: &Database, loan_id: &LoanId) {
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE loans SET validity_end = NULL WHERE id = ?1",
                [loan_id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn critical_loan_creates_one_red_alert() {
        let f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &loan_id, now + Duration::days(4));

        let report = f.runner.run_sweep(now).unwrap();
        assert_eq!(report.loans_checked, 1);
        assert_eq!(report.created, 1);

        let alerts = AlertRepo::new(f.db.clone()).list_for_loan(&loan_id).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ValidityCritical);
        assert_eq!(alerts[0].severity, Severity::Red);
        assert_eq!(alerts[0].status, AlertStatus::Pending);
        assert!(alerts[0].message.contains("4 jours"));
    }

    #[test]
    fn expired_loan_gets_no_alert_from_sweep() {
        let f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &loan_id, now - Duration::days(1));

        let report = f.runner.run_sweep(now).unwrap();
        assert_eq!(report.candidates, 0);
        assert_eq!(report.created, 0);
    }

    #[test]
    fn classic_warning_boundary_at_forty_days() {
        let f = fixture();
        let now = Utc::now();

        let at_41 = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &at_41, now + Duration::days(41));
        let at_40 = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &at_40, now + Duration::days(40));

        let report = f.runner.run_sweep(now).unwrap();
        assert_eq!(report.created, 1);

        let alert_repo = AlertRepo::new(f.db.clone());
        assert!(alert_repo.list_for_loan(&at_41).unwrap().is_empty());
        let alerts = alert_repo.list_for_loan(&at_40).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ValidityWarning);
        assert_eq!(alerts[0].severity, Severity::Orange);
    }

    #[test]
    fn sweep_is_idempotent_without_state_change() {
        let f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &loan_id, now + Duration::days(3));

        let first = f.runner.run_sweep(now).unwrap();
        assert_eq!(first.created, 1);
        assert_eq!(first.suppressed, 0);

        let second = f.runner.run_sweep(now + Duration::hours(1)).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.suppressed, 1);

        let alerts = AlertRepo::new(f.db.clone()).list_for_loan(&loan_id).unwrap();
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn dedup_does_not_refresh_existing_message() {
        let f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &loan_id, now + Duration::days(30));

        f.runner.run_sweep(now).unwrap();
        let alert_repo = AlertRepo::new(f.db.clone());
        let before = alert_repo.list_for_loan(&loan_id).unwrap();

        // Ten days later the countdown has moved, but the open alert is
        // suppressed untouched.
        f.runner.run_sweep(now + Duration::days(10)).unwrap();
        let after = alert_repo.list_for_loan(&loan_id).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].message, before[0].message);
        assert_eq!(after[0].triggered_at, before[0].triggered_at);
    }

    #[test]
    fn resolved_alert_allows_refire() {
        let f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &loan_id, now + Duration::days(3));

        f.runner.run_sweep(now).unwrap();
        let alert_repo = AlertRepo::new(f.db.clone());
        let first = &alert_repo.list_for_loan(&loan_id).unwrap()[0];
        alert_repo.resolve(&first.id, now).unwrap();

        let report = f.runner.run_sweep(now + Duration::hours(1)).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(alert_repo.list_for_loan(&loan_id).unwrap().len(), 2);
    }

    #[test]
    fn malformed_loan_is_skipped_not_fatal() {
        let f = fixture();
        let now = Utc::now();

        let broken = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        clear_validity_end(&f.db, &broken);
        let healthy = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &healthy, now + Duration::days(2));

        let report = f.runner.run_sweep(now).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
        assert_eq!(
            AlertRepo::new(f.db.clone()).list_for_loan(&healthy).unwrap().len(),
            1
        );
    }

    #[test]
    fn work_delay_path_end_to_end() {
        let f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicBuilder, LoanStatus::Disbursing);

        let disb_repo = DisbursementRepo::new(f.db.clone());
        let d = disb_repo
            .create(&loan_id, 1, 5_000_000.0, now - Duration::days(10))
            .unwrap();
        disb_repo.update_status(&d.id, DisbursementStatus::InProgress).unwrap();
        disb_repo.update_progress(&d.id, 5).unwrap();

        let report = f.runner.run_sweep(now).unwrap();
        assert_eq!(report.disbursements_checked, 1);
        assert_eq!(report.created, 1);

        let alerts = AlertRepo::new(f.db.clone()).list_for_loan(&loan_id).unwrap();
        assert_eq!(alerts[0].kind, AlertKind::WorkDelayWarning);
        assert!(alerts[0].message.contains("5%"));
    }

    #[test]
    fn repayment_path_end_to_end() {
        let f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Disbursing);
        LoanRepo::new(f.db.clone())
            .set_first_payment_date(&loan_id, now - Duration::days(23))
            .unwrap();

        let report = f.runner.run_sweep(now).unwrap();
        assert_eq!(report.created, 1);

        let alerts = AlertRepo::new(f.db.clone()).list_for_loan(&loan_id).unwrap();
        assert_eq!(alerts[0].kind, AlertKind::RepaymentImminent);
        assert_eq!(alerts[0].severity, Severity::Red);
    }

    #[test]
    fn multiple_rules_can_fire_for_one_loan() {
        let f = fixture();
        let now = Utc::now();
        // Disbursing loan with both a lagging tranche and an imminent repayment
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Disbursing);
        LoanRepo::new(f.db.clone())
            .set_first_payment_date(&loan_id, now - Duration::days(25))
            .unwrap();

        let disb_repo = DisbursementRepo::new(f.db.clone());
        let d = disb_repo
            .create(&loan_id, 1, 5_000_000.0, now - Duration::days(20))
            .unwrap();
        disb_repo.update_status(&d.id, DisbursementStatus::InProgress).unwrap();

        let report = f.runner.run_sweep(now).unwrap();
        assert_eq!(report.created, 2);

        let kinds: Vec<AlertKind> = AlertRepo::new(f.db.clone())
            .list_for_loan(&loan_id)
            .unwrap()
            .iter()
            .map(|a| a.kind)
            .collect();
        assert!(kinds.contains(&AlertKind::WorkDelayWarning));
        assert!(kinds.contains(&AlertKind::RepaymentImminent));
    }

    #[test]
    fn created_alerts_are_enqueued_for_dispatch() {
        let mut f = fixture();
        let now = Utc::now();
        let loan_id = make_loan(&f.db, LoanType::ClassicAcquirer, LoanStatus::Approved);
        set_validity_end(&f.db, &loan_id, now + Duration::days(2));

        f.runner.run_sweep(now).unwrap();

        let enqueued = f.rx.try_recv().unwrap();
        let alert = AlertRepo::new(f.db.clone()).get(&enqueued).unwrap();
        assert_eq!(alert.loan_id, loan_id);
        assert!(f.rx.try_recv().is_err());
    }

    #[test]
    fn full_dispatch_queue_does_not_fail_sweep() {
        let db = Database::in_memory().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let runner = SweepRunner::new(db.clone(), tx, Locale::Fr);
        let now = Utc::now();

        for _ in 0..3 {
            let loan_id = make_loan(&db, LoanType::ClassicAcquirer, LoanStatus::Approved);
            set_validity_end(&db, &loan_id, now + Duration::days(2));
        }

        // Queue capacity 1: two of three enqueues fail, all three rows land.
        let report = runner.run_sweep(now).unwrap();
        assert_eq!(report.created, 3);
    }
}
