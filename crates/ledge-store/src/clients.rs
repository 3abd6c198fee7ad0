use chrono::Utc;
use tracing::instrument;

use ledge_core::client::Client;
use ledge_core::ids::ClientId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

pub struct ClientRepo {
    db: Database,
}

impl ClientRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(first_name, last_name))]
    pub fn create(
        &self,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Client, StoreError> {
        let id = ClientId::new();
        let now = Utc::now();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO clients (id, first_name, last_name, email, phone, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    first_name,
                    last_name,
                    email,
                    phone,
                    now.to_rfc3339(),
                ],
            )?;

            Ok(Client {
                id,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: email.map(str::to_string),
                phone: phone.map(str::to_string),
                created_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(client_id = %id))]
    pub fn get(&self, id: &ClientId) -> Result<Client, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, first_name, last_name, email, phone, created_at
                 FROM clients WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_client(row),
                None => Err(StoreError::NotFound(format!("client {id}"))),
            }
        })
    }

    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Client>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, first_name, last_name, email, phone, created_at
                 FROM clients ORDER BY created_at DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_client(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_client(row: &rusqlite::Row<'_>) -> Result<Client, StoreError> {
    let created_raw: String = row_helpers::get(row, 5, "clients", "created_at")?;
    Ok(Client {
        id: ClientId::from_raw(row_helpers::get::<String>(row, 0, "clients", "id")?),
        first_name: row_helpers::get(row, 1, "clients", "first_name")?,
        last_name: row_helpers::get(row, 2, "clients", "last_name")?,
        email: row_helpers::get_opt(row, 3, "clients", "email")?,
        phone: row_helpers::get_opt(row, 4, "clients", "phone")?,
        created_at: row_helpers::parse_timestamp(&created_raw, "clients", "created_at")?,
    })
}
