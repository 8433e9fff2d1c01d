/// Plain-text key/value report
///
/// One `<KEY> <value>` line per field in a fixed order, preceded by a
/// `Date`/`Time` header taken from the host clock. The same key names are
/// understood by the capture driver, so a saved report can be replayed.
use time::OffsetDateTime;

use crate::append;
use crate::buffer::DynamicBuffer;
use crate::error::Result;
use crate::models::{Hygrometer, MinMax, Quantity, RainPeriod, Timestamp, WeatherSnapshot};
use crate::utils::format_report_header;

/// Header lines plus measurement lines in a complete report
pub const REPORT_LINES: usize = 78;

pub fn quantity_key(quantity: Quantity) -> &'static str {
    match quantity {
        Quantity::TemperatureIndoor => "Ti",
        Quantity::TemperatureOutdoor => "To",
        Quantity::Dewpoint => "DP",
        Quantity::Windchill => "WC",
        Quantity::WindSpeed => "WS",
        Quantity::RelativePressure => "RP",
    }
}

pub fn humidity_key(sensor: Hygrometer) -> &'static str {
    match sensor {
        Hygrometer::Indoor => "RHi",
        Hygrometer::Outdoor => "RHo",
    }
}

pub fn rain_key(period: RainPeriod) -> &'static str {
    match period {
        RainPeriod::OneHour => "R1h",
        RainPeriod::Day => "R24h",
        RainPeriod::Total => "Rtot",
    }
}

fn push_clock(buf: &mut DynamicBuffer, key: &str, ts: &Timestamp) -> Result<()> {
    append!(buf, "T{} {:02}:{:02}\n", key, ts.hour, ts.minute)?;
    Ok(())
}

fn push_date(buf: &mut DynamicBuffer, key: &str, ts: &Timestamp) -> Result<()> {
    append!(buf, "D{} {:04}-{:02}-{:02}\n", key, ts.year, ts.month, ts.day)?;
    Ok(())
}

fn push_occurrences<T>(buf: &mut DynamicBuffer, key: &str, extremes: &MinMax<T>) -> Result<()> {
    let min_key = format!("{}min", key);
    let max_key = format!("{}max", key);
    push_clock(buf, &min_key, &extremes.time_min)?;
    push_date(buf, &min_key, &extremes.time_min)?;
    push_clock(buf, &max_key, &extremes.time_max)?;
    push_date(buf, &max_key, &extremes.time_max)?;
    Ok(())
}

fn push_extremes(buf: &mut DynamicBuffer, key: &str, extremes: &MinMax<f64>) -> Result<()> {
    append!(buf, "{}min {:.1}\n{}max {:.1}\n", key, extremes.min, key, extremes.max)?;
    push_occurrences(buf, key, extremes)
}

fn push_scalar_block(
    buf: &mut DynamicBuffer,
    snapshot: &WeatherSnapshot,
    quantity: Quantity,
) -> Result<()> {
    let key = quantity_key(quantity);
    append!(buf, "{} {:.1}\n", key, snapshot.current(quantity)?)?;
    push_extremes(buf, key, &snapshot.extremes(quantity)?)
}

fn push_humidity_block(
    buf: &mut DynamicBuffer,
    snapshot: &WeatherSnapshot,
    sensor: Hygrometer,
) -> Result<()> {
    let key = humidity_key(sensor);
    let extremes = snapshot.humidity_extremes(sensor)?;
    append!(buf, "{} {}\n", key, snapshot.humidity(sensor)?)?;
    append!(buf, "{}min {}\n{}max {}\n", key, extremes.min, key, extremes.max)?;
    push_occurrences(buf, key, &extremes)
}

fn push_rain_block(
    buf: &mut DynamicBuffer,
    snapshot: &WeatherSnapshot,
    period: RainPeriod,
) -> Result<()> {
    let key = rain_key(period);
    let record = snapshot.rain_record(period)?;
    append!(buf, "{} {:.2}\n", key, snapshot.rain(period)?)?;
    if period == RainPeriod::Total {
        push_clock(buf, key, &record.time)?;
        return push_date(buf, key, &record.time);
    }
    let max_key = format!("{}max", key);
    append!(buf, "{} {:.2}\n", max_key, record.value)?;
    push_clock(buf, &max_key, &record.time)?;
    push_date(buf, &max_key, &record.time)
}

/// Render the measurement block without the header.
pub fn render_block(snapshot: &WeatherSnapshot) -> Result<String> {
    let mut buf = DynamicBuffer::with_capacity(2048)?;

    push_scalar_block(&mut buf, snapshot, Quantity::TemperatureIndoor)?;
    push_scalar_block(&mut buf, snapshot, Quantity::TemperatureOutdoor)?;
    push_scalar_block(&mut buf, snapshot, Quantity::Dewpoint)?;
    push_humidity_block(&mut buf, snapshot, Hygrometer::Indoor)?;
    push_humidity_block(&mut buf, snapshot, Hygrometer::Outdoor)?;

    let wind = snapshot.wind()?;
    append!(buf, "WS {:.1}\nDIRtext {}\n", wind.speed, wind.direction_text())?;
    for (i, angle) in wind.historical_angles.iter().enumerate() {
        append!(buf, "DIR{} {:.1}\n", i, angle)?;
    }

    push_scalar_block(&mut buf, snapshot, Quantity::Windchill)?;
    push_extremes(&mut buf, "WS", &snapshot.extremes(Quantity::WindSpeed)?)?;

    push_rain_block(&mut buf, snapshot, RainPeriod::OneHour)?;
    push_rain_block(&mut buf, snapshot, RainPeriod::Day)?;
    push_rain_block(&mut buf, snapshot, RainPeriod::Total)?;

    append!(
        buf,
        "RP {:.3}\n",
        snapshot.current(Quantity::RelativePressure)?
    )?;
    push_extremes(
        &mut buf,
        "RP",
        &snapshot.extremes(Quantity::RelativePressure)?,
    )?;

    let outlook = snapshot.tendency_forecast()?;
    append!(
        buf,
        "Tendency {}\nForecast {}\n",
        outlook.tendency,
        outlook.forecast
    )?;

    Ok(buf.into_string())
}

/// Render the full report: host-clock header followed by the block.
pub fn render(snapshot: &WeatherSnapshot, now: &OffsetDateTime) -> Result<String> {
    let block = render_block(snapshot)?;
    let header = format_report_header(now);
    let mut buf = DynamicBuffer::with_capacity(header.len() + block.len() + 1)?;
    buf.push_str(&header)?;
    buf.push_str(&block)?;
    Ok(buf.into_string())
}
