/// Executes a read plan against a station session
use log::error;

use crate::acquisition::plan::{ReadPlan, ReadStep};
use crate::config::Units;
use crate::error::{Error, Result};
use crate::logging::RunLog;
use crate::models::{WeatherSnapshot, DIRECTIONS};
use crate::station::{StationError, StationSession};

pub struct Sequencer<'a> {
    units: Units,
    log: &'a RunLog,
}

impl<'a> Sequencer<'a> {
    pub fn new(units: Units, log: &'a RunLog) -> Self {
        Sequencer { units, log }
    }

    /// Run `plan` on an already open session, then close it.
    pub fn collect<T: StationSession>(
        &self,
        session: &mut T,
        plan: &ReadPlan,
    ) -> Result<WeatherSnapshot> {
        let outcome = self.read_all(session, plan);

        self.log
            .max(format_args!("Closing weather station to release the device"));
        let closed = session.close();

        match (outcome, closed) {
            (Ok(snapshot), Ok(())) => Ok(snapshot),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                error!("Failed to close weather station after error: {}", close_err);
                Err(e)
            }
        }
    }

    fn read_all<T: StationSession>(
        &self,
        session: &mut T,
        plan: &ReadPlan,
    ) -> Result<WeatherSnapshot> {
        let mut snapshot = WeatherSnapshot::new();
        for step in plan.steps() {
            self.log.max(format_args!("Read {}", step));
            self.read_step(session, *step, &mut snapshot)
                .map_err(|e| {
                    error!("Reading {} failed: {}", step, e);
                    e
                })?;
        }
        self.log
            .debug(format_args!("Read plan of {} steps complete", plan.len()));
        Ok(snapshot)
    }

    fn read_step<T: StationSession>(
        &self,
        session: &mut T,
        step: ReadStep,
        snapshot: &mut WeatherSnapshot,
    ) -> Result<()> {
        let units = &self.units;
        match step {
            ReadStep::Current(q) => {
                let convert = units.for_class(q.unit_class());
                snapshot.set_current(q, convert.apply(session.current(q)?))?;
            }
            ReadStep::Extremes(q) => {
                let convert = units.for_class(q.unit_class());
                let extremes = session.extremes(q)?.scaled(|v| convert.apply(v));
                snapshot.set_extremes(q, extremes)?;
            }
            ReadStep::Humidity(h) => snapshot.set_humidity(h, session.humidity(h)?)?,
            ReadStep::HumidityExtremes(h) => {
                snapshot.set_humidity_extremes(h, session.humidity_extremes(h)?)?
            }
            ReadStep::Rain(p) => snapshot.set_rain(p, units.rain.apply(session.rain(p)?))?,
            ReadStep::RainRecord(p) => {
                let mut record = session.rain_record(p)?;
                record.value = units.rain.apply(record.value);
                snapshot.set_rain_record(p, record)?;
            }
            ReadStep::Wind(reset) => {
                let mut wind = session.wind(reset)?;
                if usize::from(wind.direction_index) >= DIRECTIONS.len() {
                    return Err(Error::Station(StationError::io(
                        step,
                        format!("wind direction index {} out of range", wind.direction_index),
                    )));
                }
                wind.speed = units.wind_speed.apply(wind.speed);
                snapshot.set_wind(wind)?;
            }
            ReadStep::TendencyForecast => {
                snapshot.set_tendency_forecast(session.tendency_forecast()?)?
            }
            ReadStep::StationTime => snapshot.set_station_time(session.station_time()?)?,
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Conversion;
    use crate::models::{
        Hygrometer, MinMax, Quantity, RainPeriod, RainRecord, TendencyForecast, Timestamp,
        WindSample,
    };
    use crate::station::{Station, WindReset};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Open,
        Read(ReadStep),
        Close,
    }

    /// Scripted station that records every call it receives.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingStation {
        pub calls: Rc<RefCell<Vec<Call>>>,
        pub fail_on: Option<ReadStep>,
        pub refuse_open: bool,
    }

    pub(crate) struct RecordingSession {
        calls: Rc<RefCell<Vec<Call>>>,
        fail_on: Option<ReadStep>,
        closed: bool,
    }

    impl RecordingSession {
        fn record(&mut self, step: ReadStep) -> std::result::Result<(), StationError> {
            self.calls.borrow_mut().push(Call::Read(step));
            if self.fail_on == Some(step) {
                return Err(StationError::io(step, "checksum mismatch"));
            }
            Ok(())
        }
    }

    fn minmax<T: Copy>(min: T, max: T) -> MinMax<T> {
        MinMax {
            min,
            max,
            time_min: Timestamp::new(2024, 1, 9, 3, 5),
            time_max: Timestamp::new(2024, 1, 9, 15, 40),
        }
    }

    type StationResult<T> = std::result::Result<T, StationError>;

    impl StationSession for RecordingSession {
        fn current(&mut self, q: Quantity) -> StationResult<f64> {
            self.record(ReadStep::Current(q))?;
            Ok(10.0)
        }

        fn extremes(&mut self, q: Quantity) -> StationResult<MinMax<f64>> {
            self.record(ReadStep::Extremes(q))?;
            Ok(minmax(1.0, 20.0))
        }

        fn humidity(&mut self, h: Hygrometer) -> StationResult<i32> {
            self.record(ReadStep::Humidity(h))?;
            Ok(55)
        }

        fn humidity_extremes(&mut self, h: Hygrometer) -> StationResult<MinMax<i32>> {
            self.record(ReadStep::HumidityExtremes(h))?;
            Ok(minmax(20, 90))
        }

        fn rain(&mut self, p: RainPeriod) -> StationResult<f64> {
            self.record(ReadStep::Rain(p))?;
            Ok(2.0)
        }

        fn rain_record(&mut self, p: RainPeriod) -> StationResult<RainRecord> {
            self.record(ReadStep::RainRecord(p))?;
            Ok(RainRecord {
                value: 4.0,
                time: Timestamp::new(2024, 1, 1, 0, 0),
            })
        }

        fn wind(&mut self, reset: WindReset) -> StationResult<WindSample> {
            self.record(ReadStep::Wind(reset))?;
            Ok(WindSample {
                speed: 5.0,
                direction_index: 2,
                historical_angles: [45.0; 6],
            })
        }

        fn tendency_forecast(&mut self) -> StationResult<TendencyForecast> {
            self.record(ReadStep::TendencyForecast)?;
            Ok(TendencyForecast {
                tendency: "Rising".to_string(),
                forecast: "Sunny".to_string(),
            })
        }

        fn station_time(&mut self) -> StationResult<Timestamp> {
            self.record(ReadStep::StationTime)?;
            Ok(Timestamp::new(2024, 1, 9, 12, 0).with_second(33))
        }

        fn close(&mut self) -> StationResult<()> {
            if !self.closed {
                self.closed = true;
                self.calls.borrow_mut().push(Call::Close);
            }
            Ok(())
        }
    }

    impl Station for RecordingStation {
        type Session = RecordingSession;

        fn open(&self, device: &str) -> StationResult<RecordingSession> {
            if self.refuse_open {
                return Err(StationError::Connection {
                    device: device.to_string(),
                    reason: "device busy".to_string(),
                });
            }
            self.calls.borrow_mut().push(Call::Open);
            Ok(RecordingSession {
                calls: Rc::clone(&self.calls),
                fail_on: self.fail_on,
                closed: false,
            })
        }
    }

    fn reads(calls: &[Call]) -> Vec<ReadStep> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Read(step) => Some(*step),
                _ => None,
            })
            .collect()
    }

    fn acquire(
        station: &RecordingStation,
        device: &str,
        plan: &ReadPlan,
        units: Units,
    ) -> Result<WeatherSnapshot> {
        let log = RunLog::new(Some(crate::logging::Verbosity::Debug));
        let mut session = station.open(device)?;
        Sequencer::new(units, &log).collect(&mut session, plan)
    }

    #[test]
    fn executes_plan_in_order_between_open_and_close() {
        let station = RecordingStation::default();
        let plan = ReadPlan::insert_with_reset();
        let snapshot = acquire(&station, "/dev/ttyS0", &plan, Units::default()).unwrap();

        let calls = station.calls.borrow();
        assert_eq!(calls.first(), Some(&Call::Open));
        assert_eq!(calls.last(), Some(&Call::Close));
        assert_eq!(reads(&calls), plan.steps().to_vec());
        assert_eq!(snapshot.station_time().unwrap().second, Some(33));
    }

    #[test]
    fn wind_extremes_precede_resetting_wind_read() {
        let station = RecordingStation::default();
        acquire(&station, "dev", &ReadPlan::insert_with_reset(), Units::default()).unwrap();

        let steps = reads(&station.calls.borrow());
        let extremes = steps
            .iter()
            .position(|s| *s == ReadStep::Extremes(Quantity::WindSpeed))
            .unwrap();
        let reset = steps
            .iter()
            .position(|s| *s == ReadStep::Wind(WindReset::Both))
            .unwrap();
        assert!(extremes < reset);
    }

    #[test]
    fn minimal_plan_without_extremes_never_reads_them() {
        let station = RecordingStation::default();
        let snapshot = acquire(&station, "dev", &ReadPlan::minimal(false), Units::default())
            .unwrap();

        assert!(!reads(&station.calls.borrow())
            .contains(&ReadStep::Extremes(Quantity::WindSpeed)));
        assert!(snapshot.extremes(Quantity::WindSpeed).is_err());
    }

    #[test]
    fn failed_read_aborts_and_still_closes() {
        let station = RecordingStation {
            fail_on: Some(ReadStep::Current(Quantity::Dewpoint)),
            ..Default::default()
        };
        let err = acquire(&station, "dev", &ReadPlan::minimal(true), Units::default()).unwrap_err();
        assert!(matches!(err, Error::Station(StationError::Io { .. })));

        let calls = station.calls.borrow();
        assert_eq!(calls.last(), Some(&Call::Close));
        assert!(!reads(&calls).contains(&ReadStep::Humidity(Hygrometer::Indoor)));
    }

    #[test]
    fn open_failure_is_a_connection_error() {
        let station = RecordingStation {
            refuse_open: true,
            ..Default::default()
        };
        let err = acquire(&station, "/dev/ttyUSB0", &ReadPlan::full_report(), Units::default())
            .unwrap_err();
        assert!(err.to_string().contains("/dev/ttyUSB0"));
        assert!(station.calls.borrow().is_empty());
    }

    #[test]
    fn applies_unit_conversions() {
        let station = RecordingStation::default();
        let units = Units {
            temperature: Conversion {
                scale: 1.8,
                offset: 32.0,
            },
            wind_speed: Conversion::factor(3.6),
            rain: Conversion::factor(0.5),
            pressure: Conversion::IDENTITY,
        };
        let snapshot = acquire(&station, "dev", &ReadPlan::full_report(), units).unwrap();
        assert_eq!(snapshot.current(Quantity::TemperatureIndoor).unwrap(), 50.0);
        assert_eq!(snapshot.extremes(Quantity::WindSpeed).unwrap().max, 72.0);
        assert_eq!(snapshot.wind().unwrap().speed, 18.0);
        assert_eq!(snapshot.rain(RainPeriod::Day).unwrap(), 1.0);
        assert_eq!(snapshot.rain_record(RainPeriod::Day).unwrap().value, 2.0);
        assert_eq!(snapshot.humidity(Hygrometer::Outdoor).unwrap(), 55);
    }
}
