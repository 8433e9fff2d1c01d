/// Run log with four verbosity tiers on top of the `log` facade
///
/// The binaries install `env_logger` once per process; library code receives
/// a [`RunLog`] and decides per line which tier it belongs to.
use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;

use log::LevelFilter;

use crate::buffer::{BufferError, DynamicBuffer};
use crate::config::LogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    Min = 1,
    Med = 2,
    Max = 3,
    Debug = 4,
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "min" => Ok(Verbosity::Min),
            "2" | "med" => Ok(Verbosity::Med),
            "3" | "max" => Ok(Verbosity::Max),
            "4" | "debug" => Ok(Verbosity::Debug),
            other => Err(format!("unknown log level {:?}", other)),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verbosity::Min => "min",
            Verbosity::Med => "med",
            Verbosity::Max => "max",
            Verbosity::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Tier-filtered logger handed to the pipeline for one run.
#[derive(Debug, Clone)]
pub struct RunLog {
    threshold: Option<Verbosity>,
    pid: u32,
}

impl RunLog {
    pub fn new(threshold: Option<Verbosity>) -> Self {
        RunLog {
            threshold,
            pid: std::process::id(),
        }
    }

    /// A log that drops every line.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn enabled(&self, tier: Verbosity) -> bool {
        self.threshold.map_or(false, |t| tier <= t)
    }

    fn format_line(
        &self,
        tier: Verbosity,
        args: fmt::Arguments<'_>,
    ) -> Result<String, BufferError> {
        let mut line = DynamicBuffer::new()?;
        line.append(format_args!("[{}] {}: {}", self.pid, tier, args))?;
        Ok(line.into_string())
    }

    pub fn line(&self, tier: Verbosity, args: fmt::Arguments<'_>) {
        if !self.enabled(tier) {
            return;
        }
        match self.format_line(tier, args) {
            Ok(line) if tier == Verbosity::Debug => log::debug!("{}", line),
            Ok(line) => log::info!("{}", line),
            Err(e) => log::warn!("run log line dropped ({}): {} {:?}", e, tier, args.as_str()),
        }
    }

    pub fn min(&self, args: fmt::Arguments<'_>) {
        self.line(Verbosity::Min, args)
    }

    pub fn med(&self, args: fmt::Arguments<'_>) {
        self.line(Verbosity::Med, args)
    }

    pub fn max(&self, args: fmt::Arguments<'_>) {
        self.line(Verbosity::Max, args)
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.line(Verbosity::Debug, args)
    }
}

/// Install the process-wide logger.
///
/// Errors and warnings are always shown; run-log lines only when a tier is
/// configured. A `log_file` redirects everything to that file.
pub fn init_logging(config: &LogConfig) {
    let level = match config.level {
        None => LevelFilter::Warn,
        Some(Verbosity::Debug) => LevelFilter::Debug,
        Some(_) => LevelFilter::Info,
    };

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level).format_timestamp_secs();

    if let Some(path) = &config.file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", path.display(), e),
        }
    }

    // A logger may already be installed when running under a test harness.
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("MED".parse::<Verbosity>().unwrap(), Verbosity::Med);
        assert_eq!("4".parse::<Verbosity>().unwrap(), Verbosity::Debug);
        assert!("loud".parse::<Verbosity>().is_err());
    }

    #[test]
    fn threshold_filters_tiers() {
        let log = RunLog::new(Some(Verbosity::Med));
        assert!(log.enabled(Verbosity::Min));
        assert!(log.enabled(Verbosity::Med));
        assert!(!log.enabled(Verbosity::Max));
        assert!(!RunLog::silent().enabled(Verbosity::Min));
    }

    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn lines_carry_pid_and_tier() {
        let log = RunLog::new(Some(Verbosity::Debug));
        let line = log
            .format_line(Verbosity::Max, format_args!("Read {}", "WS"))
            .unwrap();
        assert_eq!(line, format!("[{}] max: Read WS", std::process::id()));
    }

    #[test]
    fn formatting_failures_are_reported() {
        let log = RunLog::new(Some(Verbosity::Debug));
        let err = log
            .format_line(Verbosity::Min, format_args!("{}", Broken))
            .unwrap_err();
        assert!(matches!(err, BufferError::Format));
        // Falls back to a warning instead of panicking.
        log.min(format_args!("{}", Broken));
    }
}
