pub mod alerts;
pub mod clients;
pub mod database;
pub mod disbursements;
pub mod error;
pub mod loans;
pub mod row_helpers;
pub mod schema;

pub use database::Database;
pub use error::StoreError;
