//! Read a WS2300-family weather station and report the measurements as a
//! text report, a MySQL row or a PostgreSQL row.
pub mod acquisition;
pub mod buffer;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod station;
pub mod utils;

pub use error::{Error, Result};
