use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::logging::Verbosity;
use crate::models::UnitClass;

/// Searched in order when no configuration path is given
pub const DEFAULT_CONFIG_NAME: &str = "ws2300.conf";

const KNOWN_KEYS: [&str; 17] = [
    "serial_device_name",
    "temperature_conv",
    "wind_speed_conv_factor",
    "rain_conv_factor",
    "pressure_conv_factor",
    "log_level",
    "log_file",
    "mysql_host",
    "mysql_user",
    "mysql_passwd",
    "mysql_database",
    "mysql_port",
    "mysql_tablename",
    "pgsql_connect",
    "pgsql_table",
    "pgsql_station",
    "pgsql_wind_minmax",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration file found (searched {0})")]
    NotFound(String),

    #[error("cannot read configuration file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("missing required configuration key {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for configuration key {key}")]
    Invalid { key: &'static str, value: String },
}

/// Escape `$` in a dotenv line so the value is taken literally
///
/// dotenv expands `$NAME` in unquoted and double-quoted values, which would
/// silently cut passwords and connection strings short. Single-quoted values
/// and `$` already escaped with a backslash are left alone.
fn literal_dollars(line: &str) -> String {
    if line.trim_start().starts_with('#') {
        return line.to_string();
    }
    let (key, value) = match line.split_once('=') {
        Some(kv) => kv,
        None => return line.to_string(),
    };
    if !value.contains('$') || value.trim_start().starts_with('\'') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 4);
    out.push_str(key);
    out.push('=');
    let mut escaped = false;
    for c in value.chars() {
        if c == '$' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out
}

/// Raw key/value settings, keys lower-cased
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().trim().to_ascii_lowercase(), v.into()))
            .collect();
        Settings { values }
    }

    /// Read a dotenv-format file; environment variables named after the
    /// upper-cased keys take precedence.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let literal: Vec<String> = text.lines().map(literal_dollars).collect();
        let literal = literal.join("\n");
        let iter = dotenv::from_read_iter(literal.as_bytes());
        let mut pairs = Vec::new();
        for item in iter {
            pairs.push(item.map_err(|e| unreadable(e.to_string()))?);
        }
        let mut settings = Settings::from_pairs(pairs);

        for key in KNOWN_KEYS {
            if let Ok(value) = env::var(key.to_ascii_uppercase()) {
                debug!("Configuration key {} overridden from environment", key);
                settings.values.insert(key.to_string(), value);
            }
        }
        Ok(settings)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T: std::str::FromStr>(
        &self,
        key: &'static str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key,
                value: value.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) => match v.as_str() {
                "1" | "yes" | "true" | "on" => Ok(true),
                "0" | "no" | "false" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { key, value: v }),
            },
        }
    }
}

/// Candidate configuration paths, in search order
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_NAME)];
    if let Some(home) = env::var_os("HOME") {
        paths.push(Path::new(&home).join(format!(".{}", DEFAULT_CONFIG_NAME)));
    }
    paths.push(Path::new("/usr/local/etc").join(DEFAULT_CONFIG_NAME));
    paths.push(Path::new("/etc").join(DEFAULT_CONFIG_NAME));
    paths
}

/// Linear conversion from the station's base units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub scale: f64,
    pub offset: f64,
}

impl Conversion {
    pub const IDENTITY: Conversion = Conversion {
        scale: 1.0,
        offset: 0.0,
    };

    pub fn factor(scale: f64) -> Self {
        Conversion { scale, offset: 0.0 }
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Units {
    pub temperature: Conversion,
    pub wind_speed: Conversion,
    pub rain: Conversion,
    pub pressure: Conversion,
}

impl Default for Units {
    fn default() -> Self {
        Units {
            temperature: Conversion::IDENTITY,
            wind_speed: Conversion::IDENTITY,
            rain: Conversion::IDENTITY,
            pressure: Conversion::IDENTITY,
        }
    }
}

impl Units {
    pub fn for_class(&self, class: UnitClass) -> Conversion {
        match class {
            UnitClass::Temperature => self.temperature,
            UnitClass::WindSpeed => self.wind_speed,
            UnitClass::Pressure => self.pressure,
        }
    }
}

/// `0` Celsius, `1` Fahrenheit, or an explicit `scale,offset` pair.
fn parse_temperature_conv(value: &str) -> Option<Conversion> {
    match value {
        "0" => Some(Conversion::IDENTITY),
        "1" => Some(Conversion {
            scale: 1.8,
            offset: 32.0,
        }),
        other => {
            let (scale, offset) = other.split_once(',')?;
            Some(Conversion {
                scale: scale.trim().parse().ok()?,
                offset: offset.trim().parse().ok()?,
            })
        }
    }
}

fn valid_table_name(name: &str) -> bool {
    let ident = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let mut parts = name.split('.');
    let first = parts.next().map(ident).unwrap_or(false);
    let rest: Vec<&str> = parts.collect();
    first && rest.len() <= 1 && rest.iter().all(|p| ident(*p))
}

fn table_name(settings: &Settings, key: &'static str) -> Result<String, ConfigError> {
    let name = settings.get(key).unwrap_or("weather");
    if !valid_table_name(name) {
        return Err(ConfigError::Invalid {
            key,
            value: name.to_string(),
        });
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: Option<Verbosity>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MySqlConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    pub table: String,
}

impl MySqlConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(MySqlConfig {
            host: settings.require("mysql_host")?.to_string(),
            user: settings.require("mysql_user")?.to_string(),
            password: settings.get("mysql_passwd").unwrap_or_default().to_string(),
            database: settings.require("mysql_database")?.to_string(),
            port: match settings.parse_or("mysql_port", 3306u16)? {
                0 => 3306,
                port => port,
            },
            table: table_name(settings, "mysql_tablename")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PgSqlConfig {
    pub connect: String,
    pub table: String,
    pub station: String,
    pub include_wind_extremes: bool,
}

impl PgSqlConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(PgSqlConfig {
            connect: settings.require("pgsql_connect")?.to_string(),
            table: table_name(settings, "pgsql_table")?,
            station: settings.require("pgsql_station")?.to_string(),
            include_wind_extremes: settings.flag("pgsql_wind_minmax")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub serial_device_name: String,
    pub units: Units,
    pub log: LogConfig,
    pub settings: Settings,
}

impl StationConfig {
    /// Load from an explicit path, or the first readable default path.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Settings::from_file(path)?,
            None => {
                let candidates = default_paths();
                let found = candidates.iter().find(|p| p.is_file()).ok_or_else(|| {
                    let searched: Vec<String> =
                        candidates.iter().map(|p| p.display().to_string()).collect();
                    ConfigError::NotFound(searched.join(", "))
                })?;
                debug!("Using configuration file {}", found.display());
                Settings::from_file(found)?
            }
        };
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let serial_device_name = settings.require("serial_device_name")?.to_string();

        let temperature = match settings.get("temperature_conv") {
            Some(value) => parse_temperature_conv(value).ok_or_else(|| ConfigError::Invalid {
                key: "temperature_conv",
                value: value.to_string(),
            })?,
            None => Conversion::IDENTITY,
        };
        let units = Units {
            temperature,
            wind_speed: Conversion::factor(settings.parse_or("wind_speed_conv_factor", 1.0)?),
            rain: Conversion::factor(settings.parse_or("rain_conv_factor", 1.0)?),
            pressure: Conversion::factor(settings.parse_or("pressure_conv_factor", 1.0)?),
        };

        let level = match settings.get("log_level") {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                key: "log_level",
                value: value.to_string(),
            })?),
            None => None,
        };
        let log = LogConfig {
            level,
            file: settings.get("log_file").map(PathBuf::from),
        };

        Ok(StationConfig {
            serial_device_name,
            units,
            log,
            settings,
        })
    }

    pub fn mysql(&self) -> Result<MySqlConfig, ConfigError> {
        MySqlConfig::from_settings(&self.settings)
    }

    pub fn pgsql(&self) -> Result<PgSqlConfig, ConfigError> {
        PgSqlConfig::from_settings(&self.settings)
    }
}
