use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Compass points indexed by the station's wind direction code
pub const DIRECTIONS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Device-local wall clock reading, no timezone attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    /// Only the station clock read reports seconds.
    pub second: Option<u8>,
}

impl Timestamp {
    pub fn new(year: i32, month: u8, day: u8, hour: u8, minute: u8) -> Self {
        Timestamp {
            year,
            month,
            day,
            hour,
            minute,
            second: None,
        }
    }

    pub fn with_second(self, second: u8) -> Self {
        Timestamp {
            second: Some(second),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax<T> {
    pub min: T,
    pub max: T,
    pub time_min: Timestamp,
    pub time_max: Timestamp,
}

impl MinMax<f64> {
    pub fn scaled(self, convert: impl Fn(f64) -> f64) -> Self {
        MinMax {
            min: convert(self.min),
            max: convert(self.max),
            ..self
        }
    }
}

/// A rain gauge value with a timestamp.
///
/// For the 1h and 24h gauges this is the recorded maximum and when it
/// occurred; for the total gauge it is the total and when the counter was
/// last reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainRecord {
    pub value: f64,
    pub time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub speed: f64,
    pub direction_index: u8,
    pub historical_angles: [f64; 6],
}

impl WindSample {
    pub fn direction_text(&self) -> &'static str {
        DIRECTIONS[usize::from(self.direction_index) % DIRECTIONS.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TendencyForecast {
    pub tendency: String,
    pub forecast: String,
}

/// Scalar measurements the station reports as a single float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quantity {
    TemperatureIndoor,
    TemperatureOutdoor,
    Dewpoint,
    Windchill,
    WindSpeed,
    RelativePressure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    Temperature,
    WindSpeed,
    Pressure,
}

impl Quantity {
    pub fn unit_class(self) -> UnitClass {
        match self {
            Quantity::TemperatureIndoor
            | Quantity::TemperatureOutdoor
            | Quantity::Dewpoint
            | Quantity::Windchill => UnitClass::Temperature,
            Quantity::WindSpeed => UnitClass::WindSpeed,
            Quantity::RelativePressure => UnitClass::Pressure,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::TemperatureIndoor => "temperature indoor",
            Quantity::TemperatureOutdoor => "temperature outdoor",
            Quantity::Dewpoint => "dewpoint",
            Quantity::Windchill => "windchill",
            Quantity::WindSpeed => "wind speed",
            Quantity::RelativePressure => "relative pressure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hygrometer {
    Indoor,
    Outdoor,
}

impl fmt::Display for Hygrometer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hygrometer::Indoor => f.write_str("humidity indoor"),
            Hygrometer::Outdoor => f.write_str("humidity outdoor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RainPeriod {
    OneHour,
    Day,
    Total,
}

impl fmt::Display for RainPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RainPeriod::OneHour => f.write_str("rain 1h"),
            RainPeriod::Day => f.write_str("rain 24h"),
            RainPeriod::Total => f.write_str("rain total"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("{0} was already stored in this snapshot")]
    AlreadyStored(String),

    #[error("{0} was not read in this run")]
    MissingReading(String),
}

fn store<K: Ord + fmt::Display, V>(
    slots: &mut BTreeMap<K, V>,
    key: K,
    value: V,
    what: &str,
) -> Result<(), SnapshotError> {
    if slots.contains_key(&key) {
        return Err(SnapshotError::AlreadyStored(format!("{} {}", key, what)));
    }
    slots.insert(key, value);
    Ok(())
}

fn fetch<'a, K: Ord + fmt::Display, V>(
    slots: &'a BTreeMap<K, V>,
    key: K,
    what: &str,
) -> Result<&'a V, SnapshotError> {
    slots
        .get(&key)
        .ok_or_else(|| SnapshotError::MissingReading(format!("{} {}", key, what)))
}

fn store_once<V>(slot: &mut Option<V>, value: V, what: &str) -> Result<(), SnapshotError> {
    if slot.is_some() {
        return Err(SnapshotError::AlreadyStored(what.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

fn fetch_once<'a, V>(slot: &'a Option<V>, what: &str) -> Result<&'a V, SnapshotError> {
    slot.as_ref()
        .ok_or_else(|| SnapshotError::MissingReading(what.to_string()))
}

/// Everything read from the station in one session.
///
/// Each slot can be filled once; reading a slot that was never filled is an
/// error, so a reporter cannot emit a value the sequencer did not read.
#[derive(Debug, Clone, Default)]
pub struct WeatherSnapshot {
    current: BTreeMap<Quantity, f64>,
    extremes: BTreeMap<Quantity, MinMax<f64>>,
    humidity: BTreeMap<Hygrometer, i32>,
    humidity_extremes: BTreeMap<Hygrometer, MinMax<i32>>,
    rain: BTreeMap<RainPeriod, f64>,
    rain_records: BTreeMap<RainPeriod, RainRecord>,
    wind: Option<WindSample>,
    tendency_forecast: Option<TendencyForecast>,
    station_time: Option<Timestamp>,
}

impl WeatherSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current(&mut self, quantity: Quantity, value: f64) -> Result<(), SnapshotError> {
        store(&mut self.current, quantity, value, "current value")
    }

    pub fn current(&self, quantity: Quantity) -> Result<f64, SnapshotError> {
        fetch(&self.current, quantity, "current value").copied()
    }

    pub fn set_extremes(
        &mut self,
        quantity: Quantity,
        value: MinMax<f64>,
    ) -> Result<(), SnapshotError> {
        store(&mut self.extremes, quantity, value, "min/max")
    }

    pub fn extremes(&self, quantity: Quantity) -> Result<MinMax<f64>, SnapshotError> {
        fetch(&self.extremes, quantity, "min/max").copied()
    }

    pub fn set_humidity(&mut self, sensor: Hygrometer, value: i32) -> Result<(), SnapshotError> {
        store(&mut self.humidity, sensor, value, "current value")
    }

    pub fn humidity(&self, sensor: Hygrometer) -> Result<i32, SnapshotError> {
        fetch(&self.humidity, sensor, "current value").copied()
    }

    pub fn set_humidity_extremes(
        &mut self,
        sensor: Hygrometer,
        value: MinMax<i32>,
    ) -> Result<(), SnapshotError> {
        store(&mut self.humidity_extremes, sensor, value, "min/max")
    }

    pub fn humidity_extremes(&self, sensor: Hygrometer) -> Result<MinMax<i32>, SnapshotError> {
        fetch(&self.humidity_extremes, sensor, "min/max").copied()
    }

    pub fn set_rain(&mut self, period: RainPeriod, value: f64) -> Result<(), SnapshotError> {
        store(&mut self.rain, period, value, "current value")
    }

    pub fn rain(&self, period: RainPeriod) -> Result<f64, SnapshotError> {
        fetch(&self.rain, period, "current value").copied()
    }

    pub fn set_rain_record(
        &mut self,
        period: RainPeriod,
        value: RainRecord,
    ) -> Result<(), SnapshotError> {
        store(&mut self.rain_records, period, value, "record")
    }

    pub fn rain_record(&self, period: RainPeriod) -> Result<RainRecord, SnapshotError> {
        fetch(&self.rain_records, period, "record").copied()
    }

    pub fn set_wind(&mut self, value: WindSample) -> Result<(), SnapshotError> {
        store_once(&mut self.wind, value, "wind")
    }

    pub fn wind(&self) -> Result<&WindSample, SnapshotError> {
        fetch_once(&self.wind, "wind")
    }

    pub fn set_tendency_forecast(&mut self, value: TendencyForecast) -> Result<(), SnapshotError> {
        store_once(&mut self.tendency_forecast, value, "tendency/forecast")
    }

    pub fn tendency_forecast(&self) -> Result<&TendencyForecast, SnapshotError> {
        fetch_once(&self.tendency_forecast, "tendency/forecast")
    }

    pub fn set_station_time(&mut self, value: Timestamp) -> Result<(), SnapshotError> {
        store_once(&mut self.station_time, value, "station time")
    }

    pub fn station_time(&self) -> Result<Timestamp, SnapshotError> {
        fetch_once(&self.station_time, "station time").copied()
    }
}
