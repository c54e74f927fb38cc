//! Column encoding shared by the repositories.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use adpilot_domain::time::Timestamp;

use crate::error::StorageError;

pub(crate) fn encode_ts(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a column value produced by [`encode_ts`] outside a row mapping.
pub(crate) fn decode_ts(raw: &str) -> Result<Timestamp, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_utc())
        .map_err(|err| StorageError::Corrupt(format!("timestamp {raw:?}: {err}")))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

/// Serde name of a unit enum variant, e.g. `"metric_threshold"`.
pub(crate) fn to_variant<T: Serialize>(value: &T) -> Result<String, StorageError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(name) => Ok(name),
        other => Err(StorageError::Corrupt(format!(
            "expected a unit variant, got {other}"
        ))),
    }
}

fn decode_error(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn corrupt(column: &str, reason: impl std::fmt::Display) -> sqlx::Error {
    decode_error(StorageError::Corrupt(format!("{column}: {reason}")))
}

/// Typed accessors used inside `FromRow` implementations.
pub(crate) trait RowExt {
    fn ts(&self, column: &str) -> Result<Timestamp, sqlx::Error>;
    fn opt_ts(&self, column: &str) -> Result<Option<Timestamp>, sqlx::Error>;
    fn json<T: DeserializeOwned>(&self, column: &str) -> Result<T, sqlx::Error>;
    fn opt_json<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>, sqlx::Error>;
    fn variant<T: DeserializeOwned>(&self, column: &str) -> Result<T, sqlx::Error>;
    fn parsed<T>(&self, column: &str) -> Result<T, sqlx::Error>
    where
        T: FromStr,
        T::Err: std::fmt::Display;
    fn count<T: TryFrom<i64>>(&self, column: &str) -> Result<T, sqlx::Error>;
}

fn parse_ts(column: &str, raw: &str) -> Result<Timestamp, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_utc())
        .map_err(|err| corrupt(column, err))
}

impl RowExt for SqliteRow {
    fn ts(&self, column: &str) -> Result<Timestamp, sqlx::Error> {
        let raw: String = self.try_get(column)?;
        parse_ts(column, &raw)
    }

    fn opt_ts(&self, column: &str) -> Result<Option<Timestamp>, sqlx::Error> {
        let raw: Option<String> = self.try_get(column)?;
        raw.map(|raw| parse_ts(column, &raw)).transpose()
    }

    fn json<T: DeserializeOwned>(&self, column: &str) -> Result<T, sqlx::Error> {
        let raw: String = self.try_get(column)?;
        serde_json::from_str(&raw).map_err(decode_error)
    }

    fn opt_json<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>, sqlx::Error> {
        let raw: Option<String> = self.try_get(column)?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(decode_error))
            .transpose()
    }

    fn variant<T: DeserializeOwned>(&self, column: &str) -> Result<T, sqlx::Error> {
        let raw: String = self.try_get(column)?;
        serde_json::from_value(serde_json::Value::String(raw)).map_err(decode_error)
    }

    fn parsed<T>(&self, column: &str) -> Result<T, sqlx::Error>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw: String = self.try_get(column)?;
        raw.parse().map_err(|err| corrupt(column, err))
    }

    fn count<T: TryFrom<i64>>(&self, column: &str) -> Result<T, sqlx::Error> {
        let raw: i64 = self.try_get(column)?;
        T::try_from(raw).map_err(|_| corrupt(column, format!("{raw} is out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_domain::rule::TriggerType;

    #[test]
    fn should_order_encoded_timestamps_chronologically() {
        let earlier = adpilot_domain::time::now();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(encode_ts(earlier) < encode_ts(later));
        assert_eq!(parse_ts("t", &encode_ts(earlier)).unwrap(), earlier);
    }

    #[test]
    fn should_encode_unit_variant_as_plain_name() {
        assert_eq!(
            to_variant(&TriggerType::MetricThreshold).unwrap(),
            "metric_threshold"
        );
    }
}
