/// Contract between the acquisition sequencer and a station driver
///
/// The wire protocol lives behind these traits. Reads return base units
/// (°C, m/s, mm, hPa); conversion to the configured units happens in the
/// sequencer. Any retrying a driver does is internal to it.
use thiserror::Error;

use crate::models::{
    Hygrometer, MinMax, Quantity, RainPeriod, RainRecord, TendencyForecast, Timestamp, WindSample,
};

#[derive(Debug, Error)]
pub enum StationError {
    #[error("cannot open weather station at {device}: {reason}")]
    Connection { device: String, reason: String },

    #[error("station read failed ({what}): {reason}")]
    Io { what: String, reason: String },
}

impl StationError {
    pub fn io(what: impl ToString, reason: impl ToString) -> Self {
        StationError::Io {
            what: what.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Which stored wind-speed extrema a wind read clears after reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindReset {
    None,
    Min,
    Max,
    Both,
}

impl WindReset {
    pub fn is_reset(self) -> bool {
        self != WindReset::None
    }

    pub fn clears_min(self) -> bool {
        matches!(self, WindReset::Min | WindReset::Both)
    }

    pub fn clears_max(self) -> bool {
        matches!(self, WindReset::Max | WindReset::Both)
    }
}

/// Opens exclusive sessions on a station device.
pub trait Station {
    type Session: StationSession;

    fn open(&self, device: &str) -> Result<Self::Session, StationError>;
}

/// An open, exclusively owned station handle.
pub trait StationSession {
    fn current(&mut self, quantity: Quantity) -> Result<f64, StationError>;

    fn extremes(&mut self, quantity: Quantity) -> Result<MinMax<f64>, StationError>;

    /// Relative humidity in percent.
    fn humidity(&mut self, sensor: Hygrometer) -> Result<i32, StationError>;

    fn humidity_extremes(&mut self, sensor: Hygrometer) -> Result<MinMax<i32>, StationError>;

    fn rain(&mut self, period: RainPeriod) -> Result<f64, StationError>;

    fn rain_record(&mut self, period: RainPeriod) -> Result<RainRecord, StationError>;

    /// Current wind; with a reset the station clears its stored wind-speed
    /// extrema once the sample has been taken.
    fn wind(&mut self, reset: WindReset) -> Result<WindSample, StationError>;

    fn tendency_forecast(&mut self) -> Result<TendencyForecast, StationError>;

    fn station_time(&mut self) -> Result<Timestamp, StationError>;

    /// Release the device. A second call is a no-op.
    fn close(&mut self) -> Result<(), StationError>;
}
