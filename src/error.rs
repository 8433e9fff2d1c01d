use thiserror::Error;

use crate::acquisition::PlanError;
use crate::buffer::BufferError;
use crate::config::ConfigError;
use crate::database::DbError;
use crate::models::SnapshotError;
use crate::pipeline::RunState;
use crate::station::StationError;

/// Everything that can end a run
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("weather station error: {0}")]
    Station(#[from] StationError),

    #[error("invalid read plan: {0}")]
    Plan(#[from] PlanError),

    #[error("incomplete measurements: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("cannot write report: {0}")]
    Output(#[from] std::io::Error),

    #[error("illegal run state change from {from:?} to {to:?}")]
    State { from: RunState, to: RunState },
}

pub type Result<T> = std::result::Result<T, Error>;
