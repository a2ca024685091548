//! Query adapter: resolve a requested day and return its totals

use crate::services::cache::AggregationCache;
use crate::types::{DayBucket, DayKey, QueryRequest, ValidationError};
use chrono::{DateTime, Utc};

/// Totals for the requested day (today if none).
///
/// Future days are rejected with `FutureDate`. A valid past day with no data
/// yields an empty bucket.
pub fn query(
    cache: &AggregationCache,
    request: &QueryRequest,
) -> Result<DayBucket, ValidationError> {
    query_at(cache, request, Utc::now())
}

pub fn query_at(
    cache: &AggregationCache,
    request: &QueryRequest,
    now: DateTime<Utc>,
) -> Result<DayBucket, ValidationError> {
    let key = resolve_day(request.date.as_deref(), now)?;
    Ok(cache.get_or_load(key))
}

/// Day key for an optional `YYYY-MM-DD` string. Absent or empty means today.
pub fn resolve_day(date: Option<&str>, now: DateTime<Utc>) -> Result<DayKey, ValidationError> {
    let raw = match date {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(DayKey::at(now)),
    };

    let key = DayKey::parse(raw)?;
    if key.is_future_at(now) {
        return Err(ValidationError::FutureDate(raw.to_string()));
    }
    Ok(key)
}
