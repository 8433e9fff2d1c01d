//! Print the station's current measurements as a text report.
use std::process::ExitCode;

use ws2300_etl::pipeline::{run_from_args, SinkKind};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    run_from_args(SinkKind::Text).await
}
