//! Calendar and cyclical features derived from a timestamp column.
//!
//! Timestamps keep whatever UTC offset they were parsed with; calendar fields
//! are read from that local wall clock. Naive timestamps are treated as UTC.

use crate::error::{FeatureError, Result};
use crate::table::{Column, Table};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use std::f64::consts::PI;

/// Names of the columns added by [`add_time_features`], in order.
pub const TIME_FEATURE_COLUMNS: [&str; 14] = [
    "year",
    "month",
    "day_of_month",
    "day_of_week",
    "day_of_year",
    "quarter",
    "hour",
    "minute",
    "day_sin",
    "day_cos",
    "month_sin",
    "month_cos",
    "time_sin",
    "time_cos",
];

/// Layouts carrying a UTC offset, tried after RFC 3339.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

const NAIVE_DATETIME_FORMATS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Strings read as null rather than parse failures.
const NULL_TOKENS: [&str; 5] = ["", "nat", "nan", "none", "null"];

/// What to do with values that cannot be read as a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateParseMode {
    /// Fail the whole operation.
    #[default]
    Raise,
    /// Replace the value with null.
    Coerce,
}

/// Unit of numeric epoch values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpochUnit {
    Seconds,
    Milliseconds,
    Microseconds,
    #[default]
    Nanoseconds,
}

impl EpochUnit {
    fn nanos_per_unit(self) -> i64 {
        match self {
            EpochUnit::Seconds => 1_000_000_000,
            EpochUnit::Milliseconds => 1_000_000,
            EpochUnit::Microseconds => 1_000,
            EpochUnit::Nanoseconds => 1,
        }
    }

    /// Convert an integer epoch value; `None` when out of range.
    pub fn to_datetime(self, value: i64) -> Option<DateTime<FixedOffset>> {
        let per_second = 1_000_000_000 / self.nanos_per_unit();
        let secs = value.div_euclid(per_second);
        let nanos = value.rem_euclid(per_second) * self.nanos_per_unit();
        DateTime::from_timestamp(secs, nanos as u32).map(|dt| dt.fixed_offset())
    }

    /// Convert a fractional epoch value; `None` when non-finite or out of range.
    pub fn float_to_datetime(self, value: f64) -> Option<DateTime<FixedOffset>> {
        let nanos = (value * self.nanos_per_unit() as f64).round();
        if !nanos.is_finite() || nanos < i64::MIN as f64 || nanos >= i64::MAX as f64 {
            return None;
        }
        EpochUnit::Nanoseconds.to_datetime(nanos as i64)
    }
}

/// Options for timestamp coercion.
#[derive(Debug, Clone, Default)]
pub struct TimeFeatureOptions {
    pub parse_mode: DateParseMode,
    pub epoch_unit: EpochUnit,
    /// Extra `strftime` layouts tried before the built-in ones.
    pub formats: Vec<String>,
}

impl TimeFeatureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parse_mode(mut self, mode: DateParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn with_epoch_unit(mut self, unit: EpochUnit) -> Self {
        self.epoch_unit = unit;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.formats.push(format.into());
        self
    }
}

/// Map `value` in a cycle of length `period` onto the unit circle.
pub fn cyclical_encode(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

fn from_naive(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    naive.and_utc().fixed_offset()
}

fn parse_with(s: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(s, format) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
        return Some(from_naive(naive));
    }
    NaiveDate::parse_from_str(s, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(from_naive)
}

/// Parse one timestamp string. Caller formats win over built-in layouts.
pub fn parse_timestamp(raw: &str, options: &TimeFeatureOptions) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();

    if let Some(dt) = options.formats.iter().find_map(|f| parse_with(s, f)) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok())
    {
        return Some(dt);
    }
    if let Some(naive) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(from_naive(naive));
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(from_naive)
}

fn is_null_token(s: &str) -> bool {
    let s = s.trim();
    NULL_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t))
}

/// Coerce a column to timestamps.
///
/// Nulls stay null. Unreadable values fail under [`DateParseMode::Raise`] and
/// become null under [`DateParseMode::Coerce`].
pub fn to_datetime(
    column: &Column,
    name: &str,
    options: &TimeFeatureOptions,
) -> Result<Vec<Option<DateTime<FixedOffset>>>> {
    let mut parsed = Vec::with_capacity(column.len());
    let mut n_coerced = 0usize;

    let mut unreadable = |row: usize, value: String| -> Result<Option<DateTime<FixedOffset>>> {
        match options.parse_mode {
            DateParseMode::Raise => Err(FeatureError::DateParse {
                column: name.to_string(),
                row,
                value,
            }),
            DateParseMode::Coerce => {
                n_coerced += 1;
                Ok(None)
            }
        }
    };

    match column {
        Column::Datetime(values) => parsed.extend_from_slice(values),
        Column::Utf8(values) => {
            for (row, value) in values.iter().enumerate() {
                let dt = match value.as_deref() {
                    None => None,
                    Some(s) if is_null_token(s) => None,
                    Some(s) => match parse_timestamp(s, options) {
                        Some(dt) => Some(dt),
                        None => unreadable(row, s.to_string())?,
                    },
                };
                parsed.push(dt);
            }
        }
        Column::Int(values) => {
            for (row, value) in values.iter().enumerate() {
                let dt = match value {
                    None => None,
                    Some(v) => match options.epoch_unit.to_datetime(*v) {
                        Some(dt) => Some(dt),
                        None => unreadable(row, v.to_string())?,
                    },
                };
                parsed.push(dt);
            }
        }
        Column::Float(values) => {
            for (row, value) in values.iter().enumerate() {
                let dt = match value {
                    None => None,
                    Some(v) if v.is_nan() => None,
                    Some(v) => match options.epoch_unit.float_to_datetime(*v) {
                        Some(dt) => Some(dt),
                        None => unreadable(row, v.to_string())?,
                    },
                };
                parsed.push(dt);
            }
        }
        other => {
            return Err(FeatureError::TypeMismatch {
                column: name.to_string(),
                expected: "datetime, string or epoch number",
                found: other.dtype(),
            })
        }
    }

    if n_coerced > 0 {
        tracing::warn!(
            column = name,
            n_coerced,
            "unparseable timestamps coerced to null"
        );
    }
    Ok(parsed)
}

type Extractor = fn(&DateTime<FixedOffset>) -> u32;

fn month(dt: &DateTime<FixedOffset>) -> u32 {
    dt.month()
}

fn day_of_month(dt: &DateTime<FixedOffset>) -> u32 {
    dt.day()
}

fn day_of_week(dt: &DateTime<FixedOffset>) -> u32 {
    dt.weekday().num_days_from_monday()
}

fn day_of_year(dt: &DateTime<FixedOffset>) -> u32 {
    dt.ordinal()
}

fn quarter(dt: &DateTime<FixedOffset>) -> u32 {
    (dt.month() - 1) / 3 + 1
}

fn hour(dt: &DateTime<FixedOffset>) -> u32 {
    dt.hour()
}

fn minute(dt: &DateTime<FixedOffset>) -> u32 {
    dt.minute()
}

/// Add calendar and cyclical features for `date_column` with default options.
pub fn add_time_features(table: &Table, date_column: &str) -> Result<Table> {
    add_time_features_with(table, date_column, &TimeFeatureOptions::default())
}

/// Add calendar and cyclical features for `date_column`.
///
/// The returned table has `date_column` coerced to [`Column::Datetime`] and
/// the fourteen [`TIME_FEATURE_COLUMNS`] appended (or replaced in place).
pub fn add_time_features_with(
    table: &Table,
    date_column: &str,
    options: &TimeFeatureOptions,
) -> Result<Table> {
    tracing::debug!(
        column = date_column,
        rows = table.n_rows(),
        mode = ?options.parse_mode,
        "add_time_features"
    );

    let parsed = to_datetime(table.column(date_column)?, date_column, options)?;

    let mut out = table.clone();
    out.with_column(date_column, Column::Datetime(parsed.clone()))?;

    out.with_column(
        "year",
        Column::Int(
            parsed
                .iter()
                .map(|d| d.as_ref().map(|d| d.year() as i64))
                .collect(),
        ),
    )?;

    let calendar: [(&str, Extractor); 7] = [
        ("month", month),
        ("day_of_month", day_of_month),
        ("day_of_week", day_of_week),
        ("day_of_year", day_of_year),
        ("quarter", quarter),
        ("hour", hour),
        ("minute", minute),
    ];
    for (name, extract) in calendar {
        let values = parsed
            .iter()
            .map(|d| d.as_ref().map(|d| extract(d) as i64))
            .collect();
        out.with_column(name, Column::Int(values))?;
    }

    let cyclical: [(&str, &str, Extractor, f64); 3] = [
        ("day_sin", "day_cos", day_of_week, 7.0),
        ("month_sin", "month_cos", month, 12.0),
        ("time_sin", "time_cos", hour, 24.0),
    ];
    for (sin_name, cos_name, extract, period) in cyclical {
        let encoded: Vec<Option<(f64, f64)>> = parsed
            .iter()
            .map(|d| {
                d.as_ref()
                    .map(|d| cyclical_encode(extract(d) as f64, period))
            })
            .collect();
        out.with_column(
            sin_name,
            Column::Float(encoded.iter().map(|e| e.map(|(s, _)| s)).collect()),
        )?;
        out.with_column(
            cos_name,
            Column::Float(encoded.iter().map(|e| e.map(|(_, c)| c)).collect()),
        )?;
    }

    Ok(out)
}
