//! Tracking adapter: validate an increment and apply it to today's bucket

use crate::services::cache::AggregationCache;
use crate::types::{DayKey, IncrementDelta, TrackRequest, ValidationError};
use serde_json::Value;

/// Apply `request` to today's bucket. The caller only learns success or a
/// validation error, never running totals.
pub fn track(cache: &AggregationCache, request: &TrackRequest) -> Result<(), ValidationError> {
    track_on(cache, DayKey::current(), request)
}

/// [`track`] against an explicit day
pub fn track_on(
    cache: &AggregationCache,
    key: DayKey,
    request: &TrackRequest,
) -> Result<(), ValidationError> {
    let (entity_id, delta) = validate(request)?;
    if delta.is_empty() {
        tracing::debug!(entity = entity_id, day = %key, "increment carried no usable amounts");
    }
    cache.apply_increment(key, entity_id, &delta);
    Ok(())
}

/// Turn a raw request into an entity id and a delta.
///
/// Non-numeric and negative amounts are dropped, not rejected. A usable
/// message amount without `isUser` is rejected because there is no way to
/// tell which counter to credit; a word amount without it is dropped.
pub fn validate(request: &TrackRequest) -> Result<(&str, IncrementDelta), ValidationError> {
    let entity_id = request
        .entity_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or(ValidationError::MissingField("entityId"))?;

    let time_ms = amount(request.time_increment_ms.as_ref());
    let messages = amount(request.message_increment.as_ref());
    let words = amount(request.word_increment.as_ref());

    let mut delta = IncrementDelta {
        time_ms,
        ..Default::default()
    };

    match request.is_user {
        Some(true) => {
            delta.user_messages = messages;
            delta.user_words = words;
        }
        Some(false) => {
            delta.ai_messages = messages;
            delta.ai_words = words;
        }
        None if messages > 0 => return Err(ValidationError::MissingField("isUser")),
        None => {}
    }

    Ok((entity_id, delta))
}

/// Non-negative whole amount from a JSON value; anything else counts as zero
fn amount(value: Option<&Value>) -> u64 {
    let Some(n) = value.and_then(Value::as_f64) else {
        return 0;
    };
    if n.is_nan() || n <= 0.0 {
        return 0;
    }
    n.round() as u64
}
