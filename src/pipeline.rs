/// One acquisition-and-report run
///
/// A run moves through `Idle → SessionOpen → Reading → SessionClosed →
/// Reporting → Done`; any error moves it to `Failed`. The station session is
/// released before anything is reported.
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, error};
use time::OffsetDateTime;

use crate::acquisition::{ReadPlan, Sequencer};
use crate::config::{MySqlConfig, PgSqlConfig, StationConfig};
use crate::database::{store_mysql, store_pgsql};
use crate::error::{Error, Result};
use crate::logging::{init_logging, RunLog};
use crate::report::sql::{mysql_insert, pgsql_insert, Dialect};
use crate::report::text;
use crate::station::{CaptureStation, Station, StationSession};
use crate::utils::{format_datetime, host_now};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    SessionOpen,
    Reading,
    SessionClosed,
    Reporting,
    Done,
    Failed,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Idle, SessionOpen)
            | (SessionOpen, Reading)
            | (Reading, SessionClosed)
            | (SessionClosed, Reporting)
            | (Reporting, Done) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Text,
    MySql,
    Postgres,
}

impl SinkKind {
    pub fn program_name(self) -> &'static str {
        match self {
            SinkKind::Text => "ws2300-fetch",
            SinkKind::MySql => "ws2300-mysql",
            SinkKind::Postgres => "ws2300-pgsql",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Sink {
    Text,
    MySql(MySqlConfig),
    Postgres(PgSqlConfig),
}

impl Sink {
    /// Resolve the sink's own settings; missing keys fail before the
    /// station is touched.
    pub fn from_config(kind: SinkKind, config: &StationConfig) -> Result<Self> {
        Ok(match kind {
            SinkKind::Text => Sink::Text,
            SinkKind::MySql => Sink::MySql(config.mysql()?),
            SinkKind::Postgres => Sink::Postgres(config.pgsql()?),
        })
    }

    pub fn plan(&self) -> ReadPlan {
        match self {
            Sink::Text => ReadPlan::full_report(),
            Sink::MySql(_) => ReadPlan::insert_with_reset(),
            Sink::Postgres(pgsql) => ReadPlan::minimal(pgsql.include_wind_extremes),
        }
    }
}

pub struct Pipeline<'a, S, W> {
    station: S,
    config: &'a StationConfig,
    sink: Sink,
    log: RunLog,
    out: W,
    clock: fn() -> OffsetDateTime,
    state: RunState,
}

impl<'a, S: Station, W: Write> Pipeline<'a, S, W> {
    pub fn new(station: S, config: &'a StationConfig, sink: Sink, log: RunLog, out: W) -> Self {
        Pipeline {
            station,
            config,
            sink,
            log,
            out,
            clock: host_now,
            state: RunState::Idle,
        }
    }

    /// Replace the host clock used for the text report header.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(Error::State {
                from: self.state,
                to: next,
            });
        }
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        match self.execute().await {
            Ok(()) => {
                self.advance(RunState::Done)?;
                self.log.min(format_args!("Finished successfully."));
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Failed;
                self.log.min(format_args!("Run failed: {}", e));
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<()> {
        let config = self.config;
        let plan = self.sink.plan();
        let device = config.serial_device_name.as_str();

        self.log.med(format_args!("Reading data from weather station."));
        self.log.max(format_args!("Opening weather station {}", device));
        let mut session = self.station.open(device)?;

        let entered = self
            .advance(RunState::SessionOpen)
            .and_then(|_| self.advance(RunState::Reading));
        if let Err(e) = entered {
            if let Err(close_err) = session.close() {
                error!("Failed to close weather station: {}", close_err);
            }
            return Err(e);
        }

        let snapshot = Sequencer::new(config.units, &self.log).collect(&mut session, &plan)?;
        self.advance(RunState::SessionClosed)?;
        self.log
            .med(format_args!("Weather station closed, reporting measurements."));

        self.advance(RunState::Reporting)?;
        match &self.sink {
            Sink::Text => {
                let report = text::render(&snapshot, &(self.clock)())?;
                self.out.write_all(report.as_bytes())?;
                self.out.flush()?;
            }
            Sink::MySql(mysql) => {
                let stmt = mysql_insert(&snapshot, &mysql.table)?;
                store_mysql(&stmt, mysql, &self.log).await?;
            }
            Sink::Postgres(pgsql) => {
                let stmt = pgsql_insert(
                    &snapshot,
                    &pgsql.table,
                    &pgsql.station,
                    pgsql.include_wind_extremes,
                )?;
                self.out
                    .write_all(stmt.preview(Dialect::Postgres)?.as_bytes())?;
                self.out.flush()?;
                store_pgsql(&stmt, pgsql, &self.log).await?;
            }
        }
        Ok(())
    }
}

/// Process exit status for a finished run
pub fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Load configuration, run one sink against the capture driver and write
/// the report to stdout.
///
/// A configuration failure is returned before any logger is installed; the
/// caller is the only place that prints it.
pub async fn run_with(kind: SinkKind, config_path: Option<&Path>) -> Result<()> {
    let config = StationConfig::load(config_path)?;
    init_logging(&config.log);

    let log = RunLog::new(config.log.level);
    log.min(format_args!(
        "Starting {} version {}",
        kind.program_name(),
        env!("CARGO_PKG_VERSION")
    ));
    log.med(format_args!("Run started at {}", format_datetime(&host_now())));

    let sink = Sink::from_config(kind, &config)?;
    let stdout = std::io::stdout();
    let mut pipeline = Pipeline::new(CaptureStation, &config, sink, log, stdout.lock());
    pipeline.run().await
}

/// Entry point shared by the binaries: the only argument is an optional
/// configuration file path.
pub async fn run_from_args(kind: SinkKind) -> std::process::ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let result = run_with(kind, config_path.as_deref()).await;
    if let Err(e) = &result {
        eprintln!("{}: {}", kind.program_name(), e);
    }
    std::process::ExitCode::from(exit_status(&result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_follow_the_run_order() {
        use RunState::*;
        let order = [Idle, SessionOpen, Reading, SessionClosed, Reporting, Done];
        for pair in order.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]));
        }
        assert!(!Idle.can_advance_to(Reporting));
        assert!(!Reading.can_advance_to(Reporting));
        assert!(Reading.can_advance_to(Failed));
        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Idle));
    }

    #[test]
    fn sinks_pick_their_plans() {
        assert_eq!(Sink::Text.plan(), ReadPlan::full_report());
        let pgsql = PgSqlConfig {
            connect: "host=localhost".to_string(),
            table: "weather".to_string(),
            station: "roof".to_string(),
            include_wind_extremes: true,
        };
        assert_eq!(Sink::Postgres(pgsql).plan(), ReadPlan::minimal(true));
    }

    #[test]
    fn failures_exit_with_one() {
        assert_eq!(exit_status(&Ok(())), 0);
        let err = Error::Config(crate::config::ConfigError::Missing("serial_device_name"));
        assert_eq!(exit_status(&Err(err)), 1);
    }
}
