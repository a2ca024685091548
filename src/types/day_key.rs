//! Calendar-day keys in the fixed civil timezone (UTC+8)
//!
//! Every reader and writer buckets by the same day boundary no matter what
//! timezone the host machine or `TZ` says.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ValidationError;

/// Offset of the civil timezone from UTC, in seconds.
pub const CIVIL_UTC_OFFSET_SECS: i64 = 8 * 3600;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

fn day_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

/// Canonical `YYYY-MM-DD` day identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Day key for an instant, as seen in the civil timezone
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self((instant + Duration::seconds(CIVIL_UTC_OFFSET_SECS)).date_naive())
    }

    /// Today's key
    pub fn current() -> Self {
        Self::at(Utc::now())
    }

    /// Strict `YYYY-MM-DD` parse. Shape and calendar validity are both checked,
    /// so `2024/01/01`, `2024-1-1` and `2024-02-30` all fail.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if !day_key_pattern().is_match(input) {
            return Err(ValidationError::InvalidFormat(input.to_string()));
        }
        NaiveDate::parse_from_str(input, DAY_KEY_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidFormat(input.to_string()))
    }

    /// True when this day is strictly after the day containing `now`
    pub fn is_future_at(&self, now: DateTime<Utc>) -> bool {
        *self > Self::at(now)
    }

    pub fn is_future(&self) -> bool {
        self.is_future_at(Utc::now())
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
