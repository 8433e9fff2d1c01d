/// Dialect-aware `INSERT` statements with bound parameters
///
/// A statement is a table plus an ordered list of columns. Each column holds
/// either a value that will be sent as a parameter, or the server's own clock
/// function. Values never end up inside the SQL text that is executed; the
/// preview rendering inlines them (quoted and escaped) for printing and
/// diagnostics only.
use crate::append;
use crate::buffer::DynamicBuffer;
use crate::error::Result;
use crate::models::{Hygrometer, Quantity, RainPeriod, Timestamp, WeatherSnapshot};
use crate::render;
use crate::utils::round_to;

/// Tag stored with every inserted row
pub const VERSION_TAG: &str = concat!("ws2300-etl ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Float(f64),
    Int(i32),
    Text(String),
    DateTime(Timestamp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Bound(SqlValue),
    /// `now()` / `current_timestamp`, evaluated by the server
    ServerClock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub value: ColumnValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    table: String,
    columns: Vec<Column>,
}

/// `YYYY-MM-DD HH:MM[:SS]`, as parsed by the dialects' date functions
pub fn datetime_text(ts: &Timestamp) -> String {
    match ts.second {
        Some(second) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            ts.year, ts.month, ts.day, ts.hour, ts.minute, second
        ),
        None => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}",
            ts.year, ts.month, ts.day, ts.hour, ts.minute
        ),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        InsertStatement {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn server_clock(&mut self, name: &'static str) -> &mut Self {
        self.columns.push(Column {
            name,
            value: ColumnValue::ServerClock,
        });
        self
    }

    pub fn bind(&mut self, name: &'static str, value: SqlValue) -> &mut Self {
        self.columns.push(Column {
            name,
            value: ColumnValue::Bound(value),
        });
        self
    }

    /// Bind a measurement rounded to one decimal place.
    pub fn bind_measurement(&mut self, name: &'static str, value: f64) -> &mut Self {
        self.bind(name, SqlValue::Float(round_to(value, 1)))
    }

    pub fn bind_text(&mut self, name: &'static str, value: &str) -> &mut Self {
        self.bind(name, SqlValue::Text(value.to_string()))
    }

    /// Parameters in placeholder order.
    pub fn parameters(&self) -> Vec<&SqlValue> {
        self.columns
            .iter()
            .filter_map(|c| match &c.value {
                ColumnValue::Bound(v) => Some(v),
                ColumnValue::ServerClock => None,
            })
            .collect()
    }

    fn expression(dialect: Dialect, value: &ColumnValue, index: usize, inline: bool) -> String {
        let value = match value {
            ColumnValue::ServerClock => {
                return match dialect {
                    Dialect::MySql => "now()".to_string(),
                    Dialect::Postgres => "current_timestamp".to_string(),
                }
            }
            ColumnValue::Bound(value) => value,
        };
        match dialect {
            Dialect::MySql => {
                let slot = || match (inline, value) {
                    (false, _) => "?".to_string(),
                    (true, SqlValue::Float(v)) => v.to_string(),
                    (true, SqlValue::Int(v)) => v.to_string(),
                    (true, SqlValue::Text(v)) => quote(v),
                    (true, SqlValue::DateTime(ts)) => quote(&datetime_text(ts)),
                };
                match value {
                    SqlValue::DateTime(ts) if ts.second.is_some() => {
                        format!("str_to_date({}, '%Y-%m-%d %H:%i:%s')", slot())
                    }
                    SqlValue::DateTime(_) => format!("str_to_date({}, '%Y-%m-%d %H:%i')", slot()),
                    _ => slot(),
                }
            }
            Dialect::Postgres => {
                let cast = match value {
                    SqlValue::Float(_) => "float8",
                    SqlValue::Int(_) => "int4",
                    SqlValue::Text(_) => "text",
                    SqlValue::DateTime(_) => "timestamp",
                };
                if !inline {
                    return format!("${}::{}", index, cast);
                }
                let literal = match value {
                    SqlValue::Float(v) => v.to_string(),
                    SqlValue::Int(v) => v.to_string(),
                    SqlValue::Text(v) => quote(v),
                    SqlValue::DateTime(ts) => quote(&datetime_text(ts)),
                };
                format!("{}::{}", literal, cast)
            }
        }
    }

    fn expressions(&self, dialect: Dialect, inline: bool) -> Vec<String> {
        let mut index = 0;
        self.columns
            .iter()
            .map(|c| {
                if let ColumnValue::Bound(_) = c.value {
                    index += 1;
                }
                Self::expression(dialect, &c.value, index, inline)
            })
            .collect()
    }

    fn build(&self, dialect: Dialect, inline: bool) -> Result<String> {
        let values = self.expressions(dialect, inline);
        match dialect {
            Dialect::MySql => {
                let mut fields = DynamicBuffer::new()?;
                let mut list = DynamicBuffer::new()?;
                for (i, (column, value)) in self.columns.iter().zip(&values).enumerate() {
                    let sep = if i == 0 { "" } else { ", " };
                    append!(fields, "{}{}", sep, column.name)?;
                    append!(list, "{}{}", sep, value)?;
                }
                Ok(render!(
                    "insert into {} ({}) values ({})",
                    self.table,
                    fields.as_str(),
                    list.as_str()
                )?)
            }
            Dialect::Postgres => {
                let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
                Ok(render!(
                    "INSERT INTO {} (\n     {}\n) VALUES (\n     {}\n)\n",
                    self.table,
                    names.join("\n   , "),
                    values.join("\n   , ")
                )?)
            }
        }
    }

    /// Statement text with placeholders, ready for execution.
    pub fn sql(&self, dialect: Dialect) -> Result<String> {
        self.build(dialect, false)
    }

    /// Statement text with the values inlined, for display.
    pub fn preview(&self, dialect: Dialect) -> Result<String> {
        self.build(dialect, true)
    }
}

/// Row for the MySQL `weather` table, including the wind-speed extrema
/// captured before the reset and the station's own clock.
pub fn mysql_insert(snapshot: &WeatherSnapshot, table: &str) -> Result<InsertStatement> {
    let wind = snapshot.wind()?;
    let wind_extremes = snapshot.extremes(Quantity::WindSpeed)?;
    let outlook = snapshot.tendency_forecast()?;

    let mut stmt = InsertStatement::new(table);
    stmt.server_clock("rec_datetime")
        .bind_measurement("temp_in", snapshot.current(Quantity::TemperatureIndoor)?)
        .bind_measurement("temp_out", snapshot.current(Quantity::TemperatureOutdoor)?)
        .bind_measurement("dewpoint", snapshot.current(Quantity::Dewpoint)?)
        .bind("rel_hum_in", SqlValue::Int(snapshot.humidity(Hygrometer::Indoor)?))
        .bind("rel_hum_out", SqlValue::Int(snapshot.humidity(Hygrometer::Outdoor)?))
        .bind_measurement("wind_speed_min", wind_extremes.min)
        .bind_measurement("wind_speed_max", wind_extremes.max)
        .bind(
            "wind_speed_min_datetime",
            SqlValue::DateTime(wind_extremes.time_min),
        )
        .bind(
            "wind_speed_max_datetime",
            SqlValue::DateTime(wind_extremes.time_max),
        )
        .bind("ws_datetime", SqlValue::DateTime(snapshot.station_time()?))
        .bind_measurement("wind_speed", wind.speed);

    const ANGLES: [&str; 6] = [
        "wind_angle0",
        "wind_angle1",
        "wind_angle2",
        "wind_angle3",
        "wind_angle4",
        "wind_angle5",
    ];
    for (name, angle) in ANGLES.iter().zip(wind.historical_angles.iter()) {
        stmt.bind_measurement(name, *angle);
    }

    stmt.bind_text("wind_direction", wind.direction_text())
        .bind_measurement("wind_chill", snapshot.current(Quantity::Windchill)?)
        .bind_measurement("rain_1h", snapshot.rain(RainPeriod::OneHour)?)
        .bind_measurement("rain_24h", snapshot.rain(RainPeriod::Day)?)
        .bind_measurement("rain_total", snapshot.rain(RainPeriod::Total)?)
        .bind_measurement(
            "rel_pressure",
            snapshot.current(Quantity::RelativePressure)?,
        )
        .bind_text("tendency", &outlook.tendency)
        .bind_text("forecast", &outlook.forecast)
        .bind_text("mysql2300_version", VERSION_TAG);
    Ok(stmt)
}

/// Row for the PostgreSQL table; the wind-speed extrema columns are only
/// present when the plan read them.
pub fn pgsql_insert(
    snapshot: &WeatherSnapshot,
    table: &str,
    station: &str,
    include_wind_extremes: bool,
) -> Result<InsertStatement> {
    let wind = snapshot.wind()?;
    let outlook = snapshot.tendency_forecast()?;

    let mut stmt = InsertStatement::new(table);
    stmt.bind_text("station", station)
        .server_clock("rec_datetime")
        .bind_measurement(
            "temperature_indoor",
            snapshot.current(Quantity::TemperatureIndoor)?,
        )
        .bind_measurement(
            "temperature_outdoor",
            snapshot.current(Quantity::TemperatureOutdoor)?,
        )
        .bind_measurement("dewpoint", snapshot.current(Quantity::Dewpoint)?)
        .bind(
            "humidity_indoor",
            SqlValue::Int(snapshot.humidity(Hygrometer::Indoor)?),
        )
        .bind(
            "humidity_outdoor",
            SqlValue::Int(snapshot.humidity(Hygrometer::Outdoor)?),
        )
        .bind_measurement("wind_speed", wind.speed);

    if include_wind_extremes {
        let extremes = snapshot.extremes(Quantity::WindSpeed)?;
        stmt.bind_measurement("wind_speed_min", extremes.min)
            .bind_measurement("wind_speed_max", extremes.max)
            .bind(
                "wind_speed_min_datetime",
                SqlValue::DateTime(extremes.time_min),
            )
            .bind(
                "wind_speed_max_datetime",
                SqlValue::DateTime(extremes.time_max),
            );
    }

    stmt.bind_measurement("wind_angle", wind.historical_angles[0])
        .bind_text("wind_direction", wind.direction_text())
        .bind_measurement("wind_chill", snapshot.current(Quantity::Windchill)?)
        .bind_measurement("rain_1h", snapshot.rain(RainPeriod::OneHour)?)
        .bind_measurement("rain_24h", snapshot.rain(RainPeriod::Day)?)
        .bind_measurement("rain_total", snapshot.rain(RainPeriod::Total)?)
        .bind_measurement(
            "rel_pressure",
            snapshot.current(Quantity::RelativePressure)?,
        )
        .bind_text("tendency", &outlook.tendency)
        .bind_text("forecast", &outlook.forecast)
        .bind_text("version", VERSION_TAG);
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::text::tests::full_snapshot;

    /// Split on commas that are not inside parentheses or quotes.
    fn split_top_level(list: &str) -> Vec<String> {
        let mut parts = vec![String::new()];
        let (mut depth, mut quoted) = (0, false);
        for c in list.chars() {
            match c {
                '\'' => quoted = !quoted,
                '(' if !quoted => depth += 1,
                ')' if !quoted => depth -= 1,
                ',' if !quoted && depth == 0 => {
                    parts.push(String::new());
                    continue;
                }
                _ => {}
            }
            if let Some(last) = parts.last_mut() {
                last.push(c);
            }
        }
        parts.into_iter().map(|p| p.trim().to_string()).collect()
    }

    /// Column list and value list of an `INSERT ... (...) VALUES (...)`.
    fn lists(sql: &str) -> (Vec<String>, Vec<String>) {
        let lower = sql.to_ascii_lowercase();
        let open = sql.find('(').unwrap();
        let close = open + sql[open..].find(')').unwrap();
        let values_at = lower.find(") values (").unwrap();
        assert_eq!(values_at, close);
        let values_open = values_at + ") values (".len();
        let values_close = sql.trim_end().rfind(')').unwrap();
        assert_eq!(lower.matches(" values ").count(), 1);
        (
            split_top_level(&sql[open + 1..close]),
            split_top_level(&sql[values_open..values_close]),
        )
    }

    fn reset_snapshot() -> WeatherSnapshot {
        let mut snapshot = full_snapshot();
        snapshot
            .set_station_time(Timestamp::new(2024, 1, 9, 12, 0).with_second(33))
            .unwrap();
        snapshot
    }

    #[test]
    fn mysql_lists_have_matching_arity() {
        let stmt = mysql_insert(&reset_snapshot(), "weather").unwrap();
        for sql in [stmt.sql(Dialect::MySql).unwrap(), stmt.preview(Dialect::MySql).unwrap()] {
            let (columns, values) = lists(&sql);
            assert_eq!(columns.len(), 27);
            assert_eq!(columns.len(), values.len());
            assert_eq!(columns[0], "rec_datetime");
            assert_eq!(values[0], "now()");
        }
        assert_eq!(stmt.parameters().len(), 26);
    }

    #[test]
    fn mysql_uses_placeholders_and_str_to_date() {
        let sql = mysql_insert(&reset_snapshot(), "weather")
            .unwrap()
            .sql(Dialect::MySql)
            .unwrap();
        assert!(sql.starts_with("insert into weather (rec_datetime, temp_in, "));
        assert!(sql.contains("str_to_date(?, '%Y-%m-%d %H:%i')"));
        assert!(sql.contains("str_to_date(?, '%Y-%m-%d %H:%i:%s')"));
        assert!(!sql.contains("NE"));
        assert!(!sql.contains("Steady"));
    }

    #[test]
    fn postgres_lists_have_matching_arity() {
        for include in [false, true] {
            let stmt = pgsql_insert(&full_snapshot(), "weather", "roof", include).unwrap();
            let sql = stmt.sql(Dialect::Postgres).unwrap();
            let (columns, values) = lists(&sql);
            assert_eq!(columns.len(), if include { 22 } else { 18 });
            assert_eq!(columns.len(), values.len());
            assert_eq!(values[0], "$1::text");
            assert_eq!(values[1], "current_timestamp");
            assert_eq!(values[2], "$2::float8");
            assert_eq!(stmt.parameters().len(), columns.len() - 1);
        }
    }

    #[test]
    fn postgres_preview_is_multiline_and_escaped() {
        let mut snapshot = WeatherSnapshot::new();
        snapshot.set_current(Quantity::TemperatureIndoor, 21.26).unwrap();
        let mut stmt = InsertStatement::new("weather");
        stmt.bind_text("station", "O'Hare")
            .server_clock("rec_datetime")
            .bind_measurement(
                "temperature_indoor",
                snapshot.current(Quantity::TemperatureIndoor).unwrap(),
            );
        let preview = stmt.preview(Dialect::Postgres).unwrap();
        assert_eq!(
            preview,
            "INSERT INTO weather (\n     station\n   , rec_datetime\n   , temperature_indoor\n) \
             VALUES (\n     'O''Hare'::text\n   , current_timestamp\n   , 21.3::float8\n)\n"
        );
    }

    #[test]
    fn wind_extremes_are_required_when_requested() {
        let mut snapshot = WeatherSnapshot::new();
        snapshot.set_current(Quantity::TemperatureIndoor, 1.0).unwrap();
        assert!(pgsql_insert(&snapshot, "weather", "roof", true).is_err());
    }

    #[test]
    fn datetime_text_pads_fields() {
        assert_eq!(
            datetime_text(&Timestamp::new(2024, 1, 9, 3, 5)),
            "2024-01-09 03:05"
        );
        assert_eq!(
            datetime_text(&Timestamp::new(2024, 1, 9, 3, 5).with_second(7)),
            "2024-01-09 03:05:07"
        );
    }
}
