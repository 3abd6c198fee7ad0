use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::instrument;

use ledge_core::ids::{ClientId, LoanId};
use ledge_core::loan::{monthly_payment, Loan, LoanStatus, LoanType};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const LOAN_COLUMNS: &str = "id, loan_number, client_id, loan_type, status, amount,
        duration_months, grace_period_months, interest_rate, monthly_payment,
        approval_date, signature_date, first_payment_date, validity_end,
        created_at, updated_at";

/// Parameters for opening a new loan dossier.
pub struct NewLoan {
    pub client_id: ClientId,
    pub loan_type: LoanType,
    pub amount: f64,
    pub duration_months: u32,
    pub grace_period_months: u32,
    /// Annual rate, percent.
    pub interest_rate: f64,
    /// Originating agency code, embedded in the loan number.
    pub agency: String,
}

pub struct LoanRepo {
    db: Database,
}

impl LoanRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a new dossier: computes the monthly payment, allocates the next
    /// loan number, and stamps the offer expiry from the product's validity
    /// window. Status starts at draft.
    #[instrument(skip(self, new), fields(client_id = %new.client_id, loan_type = %new.loan_type))]
    pub fn create(&self, new: NewLoan) -> Result<Loan, StoreError> {
        let id = LoanId::new();
        let now = Utc::now();
        let payment = monthly_payment(new.amount, new.interest_rate, new.duration_months);
        let validity_end = now + Duration::days(new.loan_type.validity_days());

        self.db.with_conn(|conn| {
            let loan_number = next_loan_number(conn, now.year(), &new.agency, new.loan_type)?;

            conn.execute(
                "INSERT INTO loans (id, loan_number, client_id, loan_type, status, amount,
                                    duration_months, grace_period_months, interest_rate,
                                    monthly_payment, validity_end, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'draft', ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    id.as_str(),
                    loan_number,
                    new.client_id.as_str(),
                    new.loan_type.to_string(),
                    new.amount,
                    new.duration_months,
                    new.grace_period_months,
                    new.interest_rate,
                    payment,
                    validity_end.to_rfc3339(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;

            Ok(Loan {
                id,
                loan_number,
                client_id: new.client_id.clone(),
                loan_type: new.loan_type,
                status: LoanStatus::Draft,
                amount: new.amount,
                duration_months: new.duration_months,
                grace_period_months: new.grace_period_months,
                interest_rate: new.interest_rate,
                monthly_payment: payment,
                approval_date: None,
                signature_date: None,
                first_payment_date: None,
                validity_end: Some(validity_end),
                created_at: now,
                updated_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(loan_id = %id))]
    pub fn get(&self, id: &LoanId) -> Result<Loan, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_loan(row),
                None => Err(StoreError::NotFound(format!("loan {id}"))),
            }
        })
    }

    /// List loans, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub fn list(
        &self,
        status: Option<LoanStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Loan>, StoreError> {
        self.db.with_conn(|conn| {
            let mut results = Vec::new();
            match status {
                Some(s) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {LOAN_COLUMNS} FROM loans WHERE status = ?1
                         ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
                    ))?;
                    let mut rows =
                        stmt.query(rusqlite::params![s.to_string(), limit, offset])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_loan(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {LOAN_COLUMNS} FROM loans
                         ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                    ))?;
                    let mut rows = stmt.query(rusqlite::params![limit, offset])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_loan(row)?);
                    }
                }
            }
            Ok(results)
        })
    }

    /// Loans in any of the given statuses. Sweep query path for the
    /// validity rule ({approved, in_progress}).
    #[instrument(skip(self, statuses))]
    pub fn list_by_statuses(&self, statuses: &[LoanStatus]) -> Result<Vec<Loan>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        self.db.with_conn(|conn| {
            let placeholders = (1..=statuses.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {LOAN_COLUMNS} FROM loans WHERE status IN ({placeholders})
                 ORDER BY created_at ASC"
            );
            let params: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_refs.as_slice())?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_loan(row)?);
            }
            Ok(results)
        })
    }

    /// Disbursing loans with a grace period and a known first payment date.
    /// Sweep query path for the repayment rule.
    #[instrument(skip(self))]
    pub fn list_repayment_watch(&self) -> Result<Vec<Loan>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOAN_COLUMNS} FROM loans
                 WHERE status = 'disbursing'
                   AND grace_period_months > 0
                   AND first_payment_date IS NOT NULL
                 ORDER BY created_at ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_loan(row)?);
            }
            Ok(results)
        })
    }

    #[instrument(skip(self), fields(loan_id = %id, status = %status))]
    pub fn update_status(&self, id: &LoanId, status: LoanStatus) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE loans SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.to_string(), Utc::now().to_rfc3339(), id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("loan {id}")));
            }
            Ok(())
        })
    }

    /// Record approval and signature dates when the offer is countersigned.
    #[instrument(skip(self), fields(loan_id = %id))]
    pub fn set_approval(
        &self,
        id: &LoanId,
        approval_date: DateTime<Utc>,
        signature_date: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE loans SET approval_date = ?1, signature_date = ?2, updated_at = ?3
                 WHERE id = ?4",
                rusqlite::params![
                    approval_date.to_rfc3339(),
                    signature_date.map(|d| d.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                    id.as_str(),
                ],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("loan {id}")));
            }
            Ok(())
        })
    }

    #[instrument(skip(self), fields(loan_id = %id))]
    pub fn set_first_payment_date(
        &self,
        id: &LoanId,
        date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE loans SET first_payment_date = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![date.to_rfc3339(), Utc::now().to_rfc3339(), id.as_str()],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("loan {id}")));
            }
            Ok(())
        })
    }
}

/// Allocate the next loan number: `YYYY/AGENCY/SEQ7/TYPE`, sequence scoped
/// to year and agency. Zero-padding keeps lexicographic order == numeric.
fn next_loan_number(
    conn: &rusqlite::Connection,
    year: i32,
    agency: &str,
    loan_type: LoanType,
) -> Result<String, StoreError> {
    let prefix = format!("{year}/{agency}/");
    let last: Option<String> = conn
        .query_row(
            "SELECT loan_number FROM loans WHERE loan_number LIKE ?1 || '%'
             ORDER BY loan_number DESC LIMIT 1",
            [&prefix],
            |row| row.get(0),
        )
        .ok();

    let sequence = match last {
        Some(number) => {
            let seq = number
                .split('/')
                .nth(2)
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or_else(|| StoreError::CorruptRow {
                    table: "loans",
                    column: "loan_number",
                    detail: format!("unparsable sequence in {number}"),
                })?;
            seq + 1
        }
        None => 1,
    };

    Ok(format!("{prefix}{sequence:07}/{}", loan_type.code()))
}

fn row_to_loan(row: &rusqlite::Row<'_>) -> Result<Loan, StoreError> {
    let loan_type_raw: String = row_helpers::get(row, 3, "loans", "loan_type")?;
    let status_raw: String = row_helpers::get(row, 4, "loans", "status")?;
    let created_raw: String = row_helpers::get(row, 14, "loans", "created_at")?;
    let updated_raw: String = row_helpers::get(row, 15, "loans", "updated_at")?;

    Ok(Loan {
        id: LoanId::from_raw(row_helpers::get::<String>(row, 0, "loans", "id")?),
        loan_number: row_helpers::get(row, 1, "loans", "loan_number")?,
        client_id: ClientId::from_raw(row_helpers::get::<String>(row, 2, "loans", "client_id")?),
        loan_type: row_helpers::parse_enum(&loan_type_raw, "loans", "loan_type")?,
        status: row_helpers::parse_enum(&status_raw, "loans", "status")?,
        amount: row_helpers::get(row, 5, "loans", "amount")?,
        duration_months: row_helpers::get(row, 6, "loans", "duration_months")?,
        grace_period_months: row_helpers::get(row, 7, "loans", "grace_period_months")?,
        interest_rate: row_helpers::get(row, 8, "loans", "interest_rate")?,
        monthly_payment: row_helpers::get(row, 9, "loans", "monthly_payment")?,
        approval_date: row_helpers::parse_timestamp_opt(
            row_helpers::get_opt(row, 10, "loans", "approval_date")?,
            "loans",
            "approval_date",
        )?,
        signature_date: row_helpers::parse_timestamp_opt(
            row_helpers::get_opt(row, 11, "loans", "signature_date")?,
            "loans",
            "signature_date",
        )?,
        first_payment_date: row_helpers::parse_timestamp_opt(
            row_helpers::get_opt(row, 12, "loans", "first_payment_date")?,
            "loans",
            "first_payment_date",
        )?,
        validity_end: row_helpers::parse_timestamp_opt(
            row_helpers::get_opt(row, 13, "loans", "validity_end")?,
            "loans",
            "validity_end",
        )?,
        created_at: row_helpers::parse_timestamp(&created_raw, "loans", "created_at")?,
        updated_at: row_helpers::parse_timestamp(&updated_raw, "loans", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRepo;

    fn setup() -> (Database, ClientId) {
        let db = Database::in_memory().unwrap();
        let client = ClientRepo::new(db.clone())
            .create("Test", "Client", Some("client@example.com"), None)
            .unwrap();
        (db, client.id)
    }

    fn new_loan(client_id: &ClientId, loan_type: LoanType) -> NewLoan {
        NewLoan {
            client_id: client_id.clone(),
            loan_type,
            amount: 10_000_000.0,
            duration_months: 240,
            grace_period_months: 2,
            interest_rate: 5.0,
            agency: "102".to_string(),
        }
    }

    #[test]
    fn create_stamps_validity_from_product() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db);

        let classic = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();
        let rental = repo
            .create(new_loan(&client_id, LoanType::RentalOrdinary))
            .unwrap();

        let classic_days = ledge_core::loan::whole_days_between(
            classic.validity_end.unwrap(),
            classic.created_at,
        );
        let rental_days = ledge_core::loan::whole_days_between(
            rental.validity_end.unwrap(),
            rental.created_at,
        );
        assert_eq!(classic_days, 60);
        assert_eq!(rental_days, 90);
    }

    #[test]
    fn create_computes_monthly_payment() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db);
        let loan = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();
        assert!((loan.monthly_payment - 65_996.0).abs() < 1.0);
        assert_eq!(loan.status, LoanStatus::Draft);
    }

    #[test]
    fn loan_numbers_sequence_within_year_and_agency() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db);

        let a = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();
        let b = repo
            .create(new_loan(&client_id, LoanType::YoungLand))
            .unwrap();

        let year = Utc::now().year();
        assert_eq!(a.loan_number, format!("{year}/102/0000001/541"));
        assert_eq!(b.loan_number, format!("{year}/102/0000002/571"));
    }

    #[test]
    fn get_roundtrips_all_fields() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db);
        let created = repo
            .create(new_loan(&client_id, LoanType::ClassicBuilder))
            .unwrap();

        let fetched = repo.get(&created.id).unwrap();
        assert_eq!(fetched.loan_number, created.loan_number);
        assert_eq!(fetched.loan_type, LoanType::ClassicBuilder);
        assert_eq!(fetched.grace_period_months, 2);
        assert_eq!(fetched.validity_end, created.validity_end);
        assert!(fetched.first_payment_date.is_none());
    }

    #[test]
    fn list_by_statuses_filters() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db);

        let a = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();
        let b = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();
        repo.create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();

        repo.update_status(&a.id, LoanStatus::Approved).unwrap();
        repo.update_status(&b.id, LoanStatus::InProgress).unwrap();

        let tracked = repo
            .list_by_statuses(&[LoanStatus::Approved, LoanStatus::InProgress])
            .unwrap();
        assert_eq!(tracked.len(), 2);

        assert!(repo.list_by_statuses(&[]).unwrap().is_empty());
    }

    #[test]
    fn repayment_watch_needs_grace_and_first_payment() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db);

        // Disbursing with grace + first payment date: in scope
        let a = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();
        repo.update_status(&a.id, LoanStatus::Disbursing).unwrap();
        repo.set_first_payment_date(&a.id, Utc::now()).unwrap();

        // Disbursing but no first payment date: out
        let b = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();
        repo.update_status(&b.id, LoanStatus::Disbursing).unwrap();

        // Zero grace: out
        let mut no_grace = new_loan(&client_id, LoanType::ClassicAcquirer);
        no_grace.grace_period_months = 0;
        let c = repo.create(no_grace).unwrap();
        repo.update_status(&c.id, LoanStatus::Disbursing).unwrap();
        repo.set_first_payment_date(&c.id, Utc::now()).unwrap();

        let watch = repo.list_repayment_watch().unwrap();
        assert_eq!(watch.len(), 1);
        assert_eq!(watch[0].id, a.id);
    }

    #[test]
    fn set_approval_records_both_dates() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db);
        let loan = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();

        let approved = Utc::now();
        repo.set_approval(&loan.id, approved, Some(approved)).unwrap();
        let fetched = repo.get(&loan.id).unwrap();
        assert_eq!(fetched.approval_date, Some(approved));
        assert_eq!(fetched.signature_date, Some(approved));
    }

    #[test]
    fn update_status_nonexistent_fails() {
        let (db, _) = setup();
        let repo = LoanRepo::new(db);
        let result = repo.update_status(&LoanId::from_raw("loan_missing"), LoanStatus::Cancelled);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn corrupt_status_surfaces_as_corrupt_row() {
        let (db, client_id) = setup();
        let repo = LoanRepo::new(db.clone());
        let loan = repo
            .create(new_loan(&client_id, LoanType::ClassicAcquirer))
            .unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "UPDATE loans SET status = 'EN_COURS' WHERE id = ?1",
                [loan.id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();

        let result = repo.get(&loan.id);
        assert!(matches!(result, Err(StoreError::CorruptRow { .. })));
    }
}
