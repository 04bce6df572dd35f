use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Deserialize;

use crate::error::{NavError, Result};

mod env;


const ENV_TIME_ZONE: &str = "FACETNAV_TIME_ZONE";
const ENV_RESULT_LIMIT: &str = "FACETNAV_RESULT_LIMIT";
const ENV_SESSION_CACHE_CAPACITY: &str = "FACETNAV_SESSION_CACHE_CAPACITY";
const ENV_REQUEST_LOG: &str = "FACETNAV_REQUEST_LOG";

const DEFAULT_RESULT_LIMIT: usize = 1000;
const DEFAULT_SESSION_CACHE_CAPACITY: usize = 4096;

/// Engine-wide settings shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Zone used to truncate relative date ranges and decompose dates.
    pub time_zone: FixedOffset,
    /// Resultset size when neither the call nor the navigation sets one.
    pub default_result_limit: usize,
    pub session_cache_capacity: usize,
    pub request_log_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_zone: utc(),
            default_result_limit: DEFAULT_RESULT_LIMIT,
            session_cache_capacity: DEFAULT_SESSION_CACHE_CAPACITY,
            request_log_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: Option<EngineSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    time_zone: Option<String>,
    default_result_limit: Option<usize>,
    session_cache_capacity: Option<usize>,
    request_log_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let time_zone = match env::env_value(ENV_TIME_ZONE) {
            Some(raw) => parse_time_zone(&raw).map_err(|err| {
                NavError::Validation(format!("invalid {ENV_TIME_ZONE}: {err}"))
            })?,
            None => utc(),
        };
        Ok(Self {
            time_zone,
            default_result_limit: env::env_size(ENV_RESULT_LIMIT, DEFAULT_RESULT_LIMIT, 1)?,
            session_cache_capacity: env::env_size(
                ENV_SESSION_CACHE_CAPACITY,
                DEFAULT_SESSION_CACHE_CAPACITY,
                1,
            )?,
            request_log_path: env::env_value(ENV_REQUEST_LOG).map(PathBuf::from),
        })
    }

    /// Reads the `[engine]` table of a TOML document; other tables are ignored.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file = toml::from_str::<ConfigFile>(text)?;
        let section = file.engine.unwrap_or_default();
        let defaults = Self::default();
        let time_zone = match section.time_zone.as_deref() {
            Some(raw) => parse_time_zone(raw)?,
            None => defaults.time_zone,
        };
        let default_result_limit =
            positive(section.default_result_limit, "default_result_limit")?
                .unwrap_or(defaults.default_result_limit);
        let session_cache_capacity =
            positive(section.session_cache_capacity, "session_cache_capacity")?
                .unwrap_or(defaults.session_cache_capacity);
        Ok(Self {
            time_zone,
            default_result_limit,
            session_cache_capacity,
            request_log_path: section.request_log_path,
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

fn positive(value: Option<usize>, key: &str) -> Result<Option<usize>> {
    match value {
        Some(0) => Err(NavError::Validation(format!(
            "engine.{key} must be at least 1"
        ))),
        other => Ok(other),
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parses `UTC`, `Z` or a `+HH:MM` / `-HH:MM` offset.
pub fn parse_time_zone(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw.eq_ignore_ascii_case("z") {
        return Ok(utc());
    }
    let invalid = || NavError::Validation(format!("invalid time zone offset: `{raw}`"));
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours = hours.parse::<i32>().map_err(|_| invalid())?;
    let minutes = minutes.parse::<i32>().map_err(|_| invalid())?;
    if hours > 18 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Source of "now" for relative date ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => *at,
        }
    }
}
