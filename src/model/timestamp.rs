//! Timestamp fields as stored in documents.
//!
//! Written as RFC 3339 strings. Read leniently: RFC 3339 strings, epoch
//! milliseconds, or `{seconds, nanoseconds}` objects are accepted, and
//! anything else reads as absent.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Null => None,
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(value = %s, error = %e, "Could not parse timestamp string");
                None
            }
        },
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        other => {
            tracing::warn!(value = %other, "Unsupported timestamp value");
            None
        }
    }
}

pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `#[serde(default, with = "flexible")]` for `Option<DateTime<Utc>>`.
pub mod flexible {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => serializer.serialize_str(&format_timestamp(t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(parse_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_the_stored_shapes() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        assert_eq!(
            parse_timestamp(&json!("2025-05-01T09:00:00Z")),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp(&json!("2025-05-01T11:00:00+02:00")),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp(&json!(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp(&json!({"seconds": expected.timestamp(), "nanoseconds": 0})),
            Some(expected)
        );
    }

    #[test]
    fn garbage_reads_as_absent() {
        assert_eq!(parse_timestamp(&json!("yesterday-ish")), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
        assert_eq!(parse_timestamp(&Value::Null), None);
    }
}
