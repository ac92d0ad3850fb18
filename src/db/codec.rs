//! Conversion of store-native values into JSON-safe primitives.
//!
//! DuckDB hands back a wide set of value types. They are narrowed into
//! [`StoreValue`] at the store boundary, and [`serialize`] turns that closed
//! variant into `serde_json::Value` for responses and prompts.
//!
//! Decimals become `f64`. Precision beyond what a double holds is lost; this is
//! accepted so that answers stay plain JSON numbers.

use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use serde_json::Number;

const ISO_DATE: &str = "%Y-%m-%d";
const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ISO_TIME: &str = "%H:%M:%S%.f";

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Closed set of scalar shapes a result cell can take.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Null,
    Boolean(bool),
    /// Exact integers (counts, ids) kept apart so they render without a fraction.
    Integer(i64),
    Number(f64),
    Text(String),
    /// Calendar dates, timestamps, times and intervals, already ISO-8601 formatted.
    DateTimeText(String),
    /// LIST and ARRAY values.
    List(Vec<StoreValue>),
    /// STRUCT and MAP values, in field order.
    Object(Vec<(String, StoreValue)>),
}

/// Converts a value to its JSON-safe form. Total over [`StoreValue`].
pub fn serialize(value: &StoreValue) -> serde_json::Value {
    match value {
        StoreValue::Null => serde_json::Value::Null,
        StoreValue::Boolean(b) => serde_json::Value::Bool(*b),
        StoreValue::Integer(i) => serde_json::Value::Number(Number::from(*i)),
        // NaN and infinities have no JSON form
        StoreValue::Number(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        StoreValue::Text(s) | StoreValue::DateTimeText(s) => serde_json::Value::String(s.clone()),
        StoreValue::List(items) => serde_json::Value::Array(items.iter().map(serialize).collect()),
        StoreValue::Object(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), serialize(value)))
                .collect(),
        ),
    }
}

impl From<Value> for StoreValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StoreValue::Null,
            Value::Boolean(b) => StoreValue::Boolean(b),
            Value::TinyInt(i) => StoreValue::Integer(i64::from(i)),
            Value::SmallInt(i) => StoreValue::Integer(i64::from(i)),
            Value::Int(i) => StoreValue::Integer(i64::from(i)),
            Value::BigInt(i) => StoreValue::Integer(i),
            Value::UTinyInt(i) => StoreValue::Integer(i64::from(i)),
            Value::USmallInt(i) => StoreValue::Integer(i64::from(i)),
            Value::UInt(i) => StoreValue::Integer(i64::from(i)),
            Value::UBigInt(i) => match i64::try_from(i) {
                Ok(i) => StoreValue::Integer(i),
                Err(_) => StoreValue::Number(i as f64),
            },
            // SUM over integer columns comes back as HUGEINT
            Value::HugeInt(i) => match i64::try_from(i) {
                Ok(i) => StoreValue::Integer(i),
                Err(_) => StoreValue::Number(i as f64),
            },
            Value::Float(f) => StoreValue::Number(f64::from(f)),
            Value::Double(f) => StoreValue::Number(f),
            Value::Decimal(d) => {
                let text = d.to_string();
                match text.parse::<f64>() {
                    Ok(f) => StoreValue::Number(f),
                    Err(_) => StoreValue::Text(text),
                }
            }
            Value::Text(s) => StoreValue::Text(s),
            Value::Date32(days) => date_text(days),
            Value::Timestamp(unit, amount) => timestamp_text(unit, amount),
            Value::Time64(unit, amount) => time_text(unit, amount),
            Value::Interval { months, days, nanos } => {
                StoreValue::DateTimeText(interval_text(months, days, nanos))
            }
            Value::Blob(bytes) => StoreValue::Text(format!("<{} bytes>", bytes.len())),
            Value::Enum(s) => StoreValue::Text(s),
            Value::List(items) | Value::Array(items) => {
                StoreValue::List(items.into_iter().map(StoreValue::from).collect())
            }
            Value::Struct(fields) => StoreValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), StoreValue::from(value.clone())))
                    .collect(),
            ),
            Value::Map(entries) => StoreValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| {
                        (map_key(StoreValue::from(key.clone())), StoreValue::from(value.clone()))
                    })
                    .collect(),
            ),
            Value::Union(inner) => StoreValue::from(*inner),
        }
    }
}

// JSON object keys must be strings
fn map_key(key: StoreValue) -> String {
    match key {
        StoreValue::Text(s) | StoreValue::DateTimeText(s) => s,
        other => serialize(&other).to_string(),
    }
}

/// ISO-8601 duration, e.g. `P1Y2M3DT4H5M6.5S`; a zero interval is `PT0S`.
fn interval_text(months: i32, days: i32, nanos: i64) -> String {
    if months == 0 && days == 0 && nanos == 0 {
        return "PT0S".to_string();
    }

    let mut text = String::from("P");
    let (years, months) = (months / 12, months % 12);
    for (amount, unit) in [(i64::from(years), 'Y'), (i64::from(months), 'M'), (i64::from(days), 'D')] {
        if amount != 0 {
            text.push_str(&format!("{amount}{unit}"));
        }
    }

    if nanos != 0 {
        let sign = if nanos < 0 { "-" } else { "" };
        let abs = nanos.unsigned_abs();
        let hours = abs / 3_600_000_000_000;
        let minutes = abs / 60_000_000_000 % 60;
        let seconds = abs / 1_000_000_000 % 60;
        let fraction = abs % 1_000_000_000;

        text.push('T');
        if hours != 0 {
            text.push_str(&format!("{sign}{hours}H"));
        }
        if minutes != 0 {
            text.push_str(&format!("{sign}{minutes}M"));
        }
        if seconds != 0 || fraction != 0 {
            if fraction == 0 {
                text.push_str(&format!("{sign}{seconds}S"));
            } else {
                let digits = format!("{fraction:09}");
                text.push_str(&format!("{sign}{seconds}.{}S", digits.trim_end_matches('0')));
            }
        }
    }

    text
}

fn to_micros(unit: TimeUnit, amount: i64) -> i64 {
    match unit {
        TimeUnit::Second => amount.saturating_mul(1_000_000),
        TimeUnit::Millisecond => amount.saturating_mul(1_000),
        TimeUnit::Microsecond => amount,
        TimeUnit::Nanosecond => amount / 1_000,
    }
}

fn date_text(days: i32) -> StoreValue {
    match days
        .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
    {
        Some(date) => StoreValue::DateTimeText(date.format(ISO_DATE).to_string()),
        None => StoreValue::Integer(i64::from(days)),
    }
}

fn timestamp_text(unit: TimeUnit, amount: i64) -> StoreValue {
    let micros = to_micros(unit, amount);
    match DateTime::from_timestamp_micros(micros) {
        Some(ts) => StoreValue::DateTimeText(ts.naive_utc().format(ISO_DATETIME).to_string()),
        None => StoreValue::Integer(micros),
    }
}

fn time_text(unit: TimeUnit, amount: i64) -> StoreValue {
    let micros = to_micros(unit, amount);
    let secs = micros.div_euclid(1_000_000);
    let nanos = micros.rem_euclid(1_000_000) * 1_000;
    match u32::try_from(secs)
        .ok()
        .zip(u32::try_from(nanos).ok())
        .and_then(|(s, n)| NaiveTime::from_num_seconds_from_midnight_opt(s, n))
    {
        Some(time) => StoreValue::DateTimeText(time.format(ISO_TIME).to_string()),
        None => StoreValue::Integer(micros),
    }
}
