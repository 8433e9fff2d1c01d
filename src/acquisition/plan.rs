/// Ordered read plans
///
/// A plan is validated once when it is built: every step may appear only
/// once, and a wind-speed min/max read must come before any wind read that
/// resets those extrema.
use std::fmt;

use thiserror::Error;

use crate::models::{Hygrometer, Quantity, RainPeriod};
use crate::station::WindReset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadStep {
    Current(Quantity),
    Extremes(Quantity),
    Humidity(Hygrometer),
    HumidityExtremes(Hygrometer),
    Rain(RainPeriod),
    RainRecord(RainPeriod),
    Wind(WindReset),
    TendencyForecast,
    StationTime,
}

impl ReadStep {
    /// Steps that fill the same snapshot slot share a slot key.
    fn slot(&self) -> ReadStep {
        match self {
            ReadStep::Wind(_) => ReadStep::Wind(WindReset::None),
            other => *other,
        }
    }
}

impl fmt::Display for ReadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStep::Current(q) => write!(f, "{}", q),
            ReadStep::Extremes(q) => write!(f, "{} min/max", q),
            ReadStep::Humidity(h) => write!(f, "{}", h),
            ReadStep::HumidityExtremes(h) => write!(f, "{} min/max", h),
            ReadStep::Rain(p) => write!(f, "{}", p),
            ReadStep::RainRecord(RainPeriod::Total) => write!(f, "rain total reset time"),
            ReadStep::RainRecord(p) => write!(f, "{} max", p),
            ReadStep::Wind(WindReset::None) => write!(f, "wind"),
            ReadStep::Wind(reset) => write!(f, "wind (reset {:?})", reset),
            ReadStep::TendencyForecast => write!(f, "tendency and forecast"),
            ReadStep::StationTime => write!(f, "station date and time"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("read step {0} appears more than once")]
    Duplicate(String),

    #[error("wind speed min/max must be read before the resetting wind read")]
    ResetBeforeExtremes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    steps: Vec<ReadStep>,
}

impl ReadPlan {
    pub fn new(steps: Vec<ReadStep>) -> Result<Self, PlanError> {
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.slot() == step.slot()) {
                return Err(PlanError::Duplicate(step.to_string()));
            }
        }

        let extremes = steps
            .iter()
            .position(|s| *s == ReadStep::Extremes(Quantity::WindSpeed));
        let reset = steps
            .iter()
            .position(|s| matches!(s, ReadStep::Wind(r) if r.is_reset()));
        if let (Some(extremes), Some(reset)) = (extremes, reset) {
            if reset < extremes {
                return Err(PlanError::ResetBeforeExtremes);
            }
        }

        Ok(ReadPlan { steps })
    }

    /// Everything the text report prints. The station clock is not read.
    pub fn full_report() -> Self {
        use Hygrometer::*;
        use Quantity::*;
        use RainPeriod::*;
        ReadPlan {
            steps: vec![
                ReadStep::Current(TemperatureIndoor),
                ReadStep::Extremes(TemperatureIndoor),
                ReadStep::Current(TemperatureOutdoor),
                ReadStep::Extremes(TemperatureOutdoor),
                ReadStep::Current(Dewpoint),
                ReadStep::Extremes(Dewpoint),
                ReadStep::Humidity(Indoor),
                ReadStep::HumidityExtremes(Indoor),
                ReadStep::Humidity(Outdoor),
                ReadStep::HumidityExtremes(Outdoor),
                ReadStep::Wind(WindReset::None),
                ReadStep::Current(Windchill),
                ReadStep::Extremes(Windchill),
                ReadStep::Extremes(WindSpeed),
                ReadStep::Rain(OneHour),
                ReadStep::RainRecord(OneHour),
                ReadStep::Rain(Day),
                ReadStep::RainRecord(Day),
                ReadStep::Rain(Total),
                ReadStep::RainRecord(Total),
                ReadStep::Current(RelativePressure),
                ReadStep::Extremes(RelativePressure),
                ReadStep::TendencyForecast,
            ],
        }
    }

    /// Current values plus wind extrema, clearing the station's wind
    /// extrema after they have been captured.
    pub fn insert_with_reset() -> Self {
        use Hygrometer::*;
        use Quantity::*;
        use RainPeriod::*;
        ReadPlan {
            steps: vec![
                ReadStep::Current(TemperatureIndoor),
                ReadStep::Current(TemperatureOutdoor),
                ReadStep::Current(Dewpoint),
                ReadStep::Humidity(Indoor),
                ReadStep::Humidity(Outdoor),
                ReadStep::Extremes(WindSpeed),
                ReadStep::StationTime,
                ReadStep::Wind(WindReset::Both),
                ReadStep::Current(Windchill),
                ReadStep::Rain(OneHour),
                ReadStep::Rain(Day),
                ReadStep::Rain(Total),
                ReadStep::Current(RelativePressure),
                ReadStep::TendencyForecast,
            ],
        }
    }

    /// Current values only, optionally with the wind-speed extrema.
    pub fn minimal(include_wind_extremes: bool) -> Self {
        use Hygrometer::*;
        use Quantity::*;
        use RainPeriod::*;
        let mut steps = vec![
            ReadStep::Current(TemperatureIndoor),
            ReadStep::Current(TemperatureOutdoor),
            ReadStep::Current(Dewpoint),
            ReadStep::Humidity(Indoor),
            ReadStep::Humidity(Outdoor),
        ];
        if include_wind_extremes {
            steps.push(ReadStep::Extremes(WindSpeed));
        }
        steps.extend([
            ReadStep::Wind(WindReset::None),
            ReadStep::Current(Windchill),
            ReadStep::Rain(OneHour),
            ReadStep::Rain(Day),
            ReadStep::Rain(Total),
            ReadStep::Current(RelativePressure),
            ReadStep::TendencyForecast,
        ]);
        ReadPlan { steps }
    }

    pub fn steps(&self) -> &[ReadStep] {
        &self.steps
    }

    pub fn contains(&self, step: ReadStep) -> bool {
        self.steps.contains(&step)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_plans_pass_validation() {
        for plan in [
            ReadPlan::full_report(),
            ReadPlan::insert_with_reset(),
            ReadPlan::minimal(false),
            ReadPlan::minimal(true),
        ] {
            assert_eq!(ReadPlan::new(plan.steps().to_vec()).unwrap(), plan);
        }
    }

    #[test]
    fn reset_before_extremes_is_rejected() {
        let err = ReadPlan::new(vec![
            ReadStep::Wind(WindReset::Max),
            ReadStep::Extremes(Quantity::WindSpeed),
        ])
        .unwrap_err();
        assert_eq!(err, PlanError::ResetBeforeExtremes);
    }

    #[test]
    fn non_resetting_wind_may_come_first() {
        assert!(ReadPlan::new(vec![
            ReadStep::Wind(WindReset::None),
            ReadStep::Extremes(Quantity::WindSpeed),
        ])
        .is_ok());
    }

    #[test]
    fn duplicate_slots_are_rejected() {
        let err = ReadPlan::new(vec![
            ReadStep::Wind(WindReset::None),
            ReadStep::Wind(WindReset::Both),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanError::Duplicate(_)));
    }

    #[test]
    fn minimal_plan_toggles_wind_extremes() {
        let wind_extremes = ReadStep::Extremes(Quantity::WindSpeed);
        assert!(!ReadPlan::minimal(false).contains(wind_extremes));
        let with = ReadPlan::minimal(true);
        let steps = with.steps();
        let extremes = steps.iter().position(|s| *s == wind_extremes).unwrap();
        let wind = steps
            .iter()
            .position(|s| matches!(s, ReadStep::Wind(_)))
            .unwrap();
        assert!(extremes < wind);
        assert_eq!(with.len(), ReadPlan::minimal(false).len() + 1);
    }
}
