/// Station driver that replays a saved text report
///
/// A capture is the output of the fetch program: a `Date`/`Time` header
/// followed by `<KEY> <value>` lines. Opening the "device" reads the whole
/// file; every read then decodes the matching keys. The header stands in
/// for the station clock.
///
/// Values must be in the station's base units (°C, m/s, mm, hPa): the
/// configured unit conversions are applied again after every read, so only
/// a report fetched without conversions replays unchanged.
use std::collections::HashMap;
use std::fs;

use log::{debug, warn};
use time::macros::format_description;

use crate::models::{
    Hygrometer, MinMax, Quantity, RainPeriod, RainRecord, TendencyForecast, Timestamp, WindSample,
    DIRECTIONS,
};
use crate::report::text::{humidity_key, quantity_key, rain_key};
use crate::station::session::{Station, StationError, StationSession, WindReset};

type Result<T> = std::result::Result<T, StationError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureStation;

impl Station for CaptureStation {
    type Session = CaptureSession;

    fn open(&self, device: &str) -> Result<CaptureSession> {
        let text = fs::read_to_string(device).map_err(|e| StationError::Connection {
            device: device.to_string(),
            reason: e.to_string(),
        })?;
        let session = CaptureSession::parse(device, &text);
        if session.values.is_empty() {
            return Err(StationError::Connection {
                device: device.to_string(),
                reason: "no station records found".to_string(),
            });
        }
        debug!(
            "Opened capture {} with {} records",
            device,
            session.values.len()
        );
        Ok(session)
    }
}

#[derive(Debug)]
pub struct CaptureSession {
    device: String,
    values: HashMap<String, String>,
    /// Wind-speed extrema after a resetting wind read
    wind_extremes: Option<MinMax<f64>>,
    closed: bool,
}

/// Decode `HH:MM` and `YYYY-MM-DD` into a station timestamp
fn decode_timestamp(key: &str, clock: &str, date: &str) -> Result<Timestamp> {
    let clock_format = format_description!("[hour]:[minute]");
    let date_format = format_description!("[year]-[month]-[day]");
    let clock = time::Time::parse(clock, &clock_format)
        .map_err(|e| StationError::io(key, format!("cannot decode time {:?}: {}", clock, e)))?;
    let date = time::Date::parse(date, &date_format)
        .map_err(|e| StationError::io(key, format!("cannot decode date {:?}: {}", date, e)))?;
    Ok(Timestamp::new(
        date.year(),
        u8::from(date.month()),
        date.day(),
        clock.hour(),
        clock.minute(),
    ))
}

impl CaptureSession {
    pub fn parse(device: &str, text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(char::is_whitespace) {
                Some((key, value)) => {
                    values.insert(key.to_string(), value.trim().to_string());
                }
                None => warn!("Ignoring capture line without value: {:?}", line),
            }
        }
        CaptureSession {
            device: device.to_string(),
            values,
            wind_extremes: None,
            closed: false,
        }
    }

    fn raw(&self, key: &str) -> Result<&str> {
        if self.closed {
            return Err(StationError::io(key, format!("{} is closed", self.device)));
        }
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StationError::io(key, "missing from capture"))
    }

    fn number<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.raw(key)?;
        raw.parse()
            .map_err(|_| StationError::io(key, format!("cannot decode {:?}", raw)))
    }

    fn timestamp(&self, key: &str) -> Result<Timestamp> {
        let clock = self.raw(&format!("T{}", key))?;
        let date = self.raw(&format!("D{}", key))?;
        decode_timestamp(key, clock, date)
    }

    fn minmax<T: std::str::FromStr>(&self, key: &str) -> Result<MinMax<T>> {
        let min_key = format!("{}min", key);
        let max_key = format!("{}max", key);
        Ok(MinMax {
            min: self.number(&min_key)?,
            max: self.number(&max_key)?,
            time_min: self.timestamp(&min_key)?,
            time_max: self.timestamp(&max_key)?,
        })
    }
}

impl StationSession for CaptureSession {
    fn current(&mut self, quantity: Quantity) -> Result<f64> {
        self.number(quantity_key(quantity))
    }

    fn extremes(&mut self, quantity: Quantity) -> Result<MinMax<f64>> {
        if quantity == Quantity::WindSpeed {
            if let Some(cleared) = self.wind_extremes {
                self.raw(quantity_key(quantity))?;
                return Ok(cleared);
            }
        }
        self.minmax(quantity_key(quantity))
    }

    fn humidity(&mut self, sensor: Hygrometer) -> Result<i32> {
        self.number(humidity_key(sensor))
    }

    fn humidity_extremes(&mut self, sensor: Hygrometer) -> Result<MinMax<i32>> {
        self.minmax(humidity_key(sensor))
    }

    fn rain(&mut self, period: RainPeriod) -> Result<f64> {
        self.number(rain_key(period))
    }

    fn rain_record(&mut self, period: RainPeriod) -> Result<RainRecord> {
        let key = rain_key(period);
        if period == RainPeriod::Total {
            return Ok(RainRecord {
                value: self.number(key)?,
                time: self.timestamp(key)?,
            });
        }
        let max_key = format!("{}max", key);
        Ok(RainRecord {
            value: self.number(&max_key)?,
            time: self.timestamp(&max_key)?,
        })
    }

    fn wind(&mut self, reset: WindReset) -> Result<WindSample> {
        let speed: f64 = self.number("WS")?;
        let text = self.raw("DIRtext")?;
        let direction_index = DIRECTIONS
            .iter()
            .position(|d| *d == text)
            .ok_or_else(|| StationError::io("DIRtext", format!("unknown direction {:?}", text)))?
            as u8;
        let mut historical_angles = [0.0; 6];
        for (i, angle) in historical_angles.iter_mut().enumerate() {
            *angle = self.number(&format!("DIR{}", i))?;
        }

        if reset.is_reset() {
            let mut extremes = match self.wind_extremes {
                Some(extremes) => extremes,
                None => self.minmax("WS")?,
            };
            let now = self.station_time().ok();
            if reset.clears_min() {
                extremes.min = speed;
                extremes.time_min = now.unwrap_or(extremes.time_min);
            }
            if reset.clears_max() {
                extremes.max = speed;
                extremes.time_max = now.unwrap_or(extremes.time_max);
            }
            debug!("Wind speed extremes reset ({:?}) in {}", reset, self.device);
            self.wind_extremes = Some(extremes);
        }

        Ok(WindSample {
            speed,
            direction_index,
            historical_angles,
        })
    }

    fn tendency_forecast(&mut self) -> Result<TendencyForecast> {
        Ok(TendencyForecast {
            tendency: self.raw("Tendency")?.to_string(),
            forecast: self.raw("Forecast")?.to_string(),
        })
    }

    fn station_time(&mut self) -> Result<Timestamp> {
        let date_format = format_description!("[year]-[month repr:short]-[day]");
        let clock_format = format_description!("[hour]:[minute]:[second]");
        let date = time::Date::parse(self.raw("Date")?, &date_format)
            .map_err(|e| StationError::io("Date", e))?;
        let clock = time::Time::parse(self.raw("Time")?, &clock_format)
            .map_err(|e| StationError::io("Time", e))?;
        Ok(Timestamp::new(
            date.year(),
            u8::from(date.month()),
            date.day(),
            clock.hour(),
            clock.minute(),
        )
        .with_second(clock.second()))
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            debug!("Closed capture {}", self.device);
            self.closed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = "Date 2024-Jan-09
Time 12:00:33
Ti 21.3
WS 3.5
DIRtext NE
DIR0 45.0
DIR1 45.0
DIR2 22.5
DIR3 45.0
DIR4 67.5
DIR5 45.0
WSmin 0.0
WSmax 14.2
TWSmin 03:05
DWSmin 2024-01-09
TWSmax 11:47
DWSmax 2024-01-08
Rtot 812.30
TRtot 08:00
DRtot 2023-11-02
RHo 87
";

    fn session() -> CaptureSession {
        CaptureSession::parse("capture.txt", CAPTURE)
    }

    #[test]
    fn decodes_scalars_and_extremes() {
        let mut s = session();
        assert_eq!(s.current(Quantity::TemperatureIndoor).unwrap(), 21.3);
        assert_eq!(s.humidity(Hygrometer::Outdoor).unwrap(), 87);
        let ws = s.extremes(Quantity::WindSpeed).unwrap();
        assert_eq!(ws.max, 14.2);
        assert_eq!(ws.time_min, Timestamp::new(2024, 1, 9, 3, 5));
        let total = s.rain_record(RainPeriod::Total).unwrap();
        assert_eq!(total.value, 812.3);
        assert_eq!(total.time, Timestamp::new(2023, 11, 2, 8, 0));
    }

    #[test]
    fn header_is_the_station_clock() {
        let mut s = session();
        assert_eq!(
            s.station_time().unwrap(),
            Timestamp::new(2024, 1, 9, 12, 0).with_second(33)
        );
    }

    #[test]
    fn reset_clears_wind_extremes_after_the_read() {
        let mut s = session();
        let wind = s.wind(WindReset::Both).unwrap();
        assert_eq!(wind.direction_index, 2);
        assert_eq!(wind.historical_angles[4], 67.5);

        let cleared = s.extremes(Quantity::WindSpeed).unwrap();
        assert_eq!(cleared.min, 3.5);
        assert_eq!(cleared.max, 3.5);
        assert_eq!(cleared.time_max.second, Some(33));
    }

    #[test]
    fn partial_reset_keeps_the_other_extreme() {
        let mut s = session();
        s.wind(WindReset::Max).unwrap();
        let ws = s.extremes(Quantity::WindSpeed).unwrap();
        assert_eq!(ws.min, 0.0);
        assert_eq!(ws.max, 3.5);
    }

    #[test]
    fn missing_keys_are_io_errors() {
        let mut s = session();
        let err = s.current(Quantity::Dewpoint).unwrap_err();
        assert!(matches!(err, StationError::Io { .. }));
    }

    #[test]
    fn impossible_times_and_dates_are_io_errors() {
        let bad_clock = CAPTURE.replace("TWSmin 03:05", "TWSmin 99:99");
        let mut s = CaptureSession::parse("capture.txt", &bad_clock);
        let err = s.extremes(Quantity::WindSpeed).unwrap_err();
        assert!(matches!(err, StationError::Io { .. }));

        let bad_date = CAPTURE.replace("DRtot 2023-11-02", "DRtot 2024-13-45");
        let mut s = CaptureSession::parse("capture.txt", &bad_date);
        let err = s.rain_record(RainPeriod::Total).unwrap_err();
        assert!(err.to_string().contains("2024-13-45"));
    }

    #[test]
    fn reads_after_close_fail() {
        let mut s = session();
        s.close().unwrap();
        s.close().unwrap();
        assert!(s.current(Quantity::TemperatureIndoor).is_err());
    }

    #[test]
    fn unreadable_device_is_a_connection_error() {
        let err = CaptureStation.open("/nonexistent/ttyS0").unwrap_err();
        assert!(matches!(err, StationError::Connection { .. }));
    }
}
