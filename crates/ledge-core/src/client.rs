use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ClientId;

/// A borrower on file. Contact details drive notification routing:
/// no email means no email notification, same for phone/SMS.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
