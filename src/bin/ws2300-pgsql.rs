//! Store the station's measurements as one row in PostgreSQL.
use std::process::ExitCode;

use ws2300_etl::pipeline::{run_from_args, SinkKind};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    run_from_args(SinkKind::Postgres).await
}
