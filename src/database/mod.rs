pub mod connection;
pub mod operations;

use thiserror::Error;

pub use connection::{connect_mysql, connect_postgres, create_ssl_connector, redact_target};
pub use operations::{store_mysql, store_pgsql};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("connection to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    #[error("could not insert row: {reason}\n{statement}")]
    Query { statement: String, reason: String },

    #[error("SSL setup failed: {0}")]
    Tls(String),

    #[error("station reported an invalid date for {column}: {value}")]
    InvalidTimestamp { column: String, value: String },
}
