//! Fixed date format used for every persisted record
//!
//! Dates and timestamps are written as `%Y-%m-%dT%H:%M:%SZ` (UTC). Calendar
//! dates are written at midnight. Plain `%Y-%m-%d` is also accepted on read.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Datetime to string format
pub const STRFTIME: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Formats a calendar date in the persisted format
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00Z").to_string()
}

/// Formats a timestamp in the persisted format
pub fn format_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.format(STRFTIME).to_string()
}

/// Parses a calendar date written by [`format_date`] or as plain `%Y-%m-%d`
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(s, STRFTIME)
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

/// Parses a timestamp written by [`format_datetime`]
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, STRFTIME)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Serde adapter for `NaiveDate` fields
pub mod date {
    use chrono::NaiveDate;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{}'", raw)))
    }
}

/// Serde adapter for `DateTime<Utc>` fields
pub mod datetime {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        datetime: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_datetime(datetime))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_datetime(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

/// Serde adapter for `Option<DateTime<Utc>>` fields
pub mod option_datetime {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        datetime: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match datetime {
            Some(dt) => serializer.serialize_some(&super::format_datetime(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_datetime(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw))),
            None => Ok(None),
        }
    }
}
