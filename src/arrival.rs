//! Arrival keys
//!
//! An arrival key ties every partition written by one run together. It has two
//! accepted string forms, `YYYYMMDD` and `YYYYMMDD_HHMMSS`, and orders by the
//! point in time it denotes.

use crate::error::{LakeError, LakeResult};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y%m%d";
const DATETIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identifier of one batch run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrivalKey {
    raw: String,
    timestamp: NaiveDateTime,
}

impl ArrivalKey {
    /// Parse an arrival key from its string form
    pub fn parse(value: &str) -> LakeResult<Self> {
        let trimmed = value.trim();
        let timestamp = match trimmed.len() {
            8 => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(|date| date.and_time(NaiveTime::MIN))
                .map_err(|e| LakeError::InvalidArrivalKey(format!("{}: {}", trimmed, e)))?,
            15 => NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
                .map_err(|e| LakeError::InvalidArrivalKey(format!("{}: {}", trimmed, e)))?,
            _ => {
                return Err(LakeError::InvalidArrivalKey(format!(
                    "{}: expected YYYYMMDD or YYYYMMDD_HHMMSS",
                    trimmed
                )))
            }
        };

        Ok(Self {
            raw: trimmed.to_string(),
            timestamp,
        })
    }

    /// Key for today's date, the form the daily trigger uses
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    /// Key for the current second
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    /// Date-only key
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            raw: date.format(DATE_FORMAT).to_string(),
            timestamp: date.and_time(NaiveTime::MIN),
        }
    }

    /// Key with second precision
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        let raw = datetime.format(DATETIME_FORMAT).to_string();
        // Drop sub-second precision so the key round-trips through its string form
        let timestamp = NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT).unwrap_or(datetime);
        Self { raw, timestamp }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Event timestamp for rows produced by this run
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

impl Ord for ArrivalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for ArrivalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ArrivalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ArrivalKey {
    type Err = LakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ArrivalKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ArrivalKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_date_form() {
        let key = ArrivalKey::parse("20250823").unwrap();
        assert_eq!(key.as_str(), "20250823");
        assert_eq!(
            key.timestamp(),
            NaiveDate::from_ymd_opt(2025, 8, 23)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_datetime_form() {
        let key = ArrivalKey::parse("20250823_141503").unwrap();
        assert_eq!(key.timestamp().hour(), 14);
        assert_eq!(key.timestamp().second(), 3);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ArrivalKey::parse("2025-08-23").is_err());
        assert!(ArrivalKey::parse("20251340").is_err());
        assert!(ArrivalKey::parse("20250823_256000").is_err());
        assert!(ArrivalKey::parse("").is_err());
    }

    #[test]
    fn test_ordering_follows_time() {
        let day = ArrivalKey::parse("20250823").unwrap();
        let later = ArrivalKey::parse("20250823_000001").unwrap();
        let next_day = ArrivalKey::parse("20250824").unwrap();
        assert!(day < later);
        assert!(later < next_day);
    }

    #[test]
    fn test_from_datetime_round_trips() {
        let key = ArrivalKey::now();
        let parsed: ArrivalKey = key.as_str().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_serde_as_string() {
        let key = ArrivalKey::parse("20250823").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"20250823\"");
        let back: ArrivalKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
