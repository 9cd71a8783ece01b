//! Fixed-point sentiment encoding for ledger storage: score × 100 as an integer.

/// Integer units per 1.0 of sentiment.
pub const SENTIMENT_SCALE: f64 = 100.0;
pub const ENCODED_MIN: i32 = -100;
pub const ENCODED_MAX: i32 = 100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("sentiment {0} outside representable range [-1.0, 1.0]")]
    OutOfRange(f64),
    #[error("sentiment is not a finite number")]
    NotFinite,
}

/// Rounds to the nearest integer, halves away from zero.
///
/// The product is first snapped to 6 decimals so binary noise does not flip a
/// half: `0.285 * 100.0` is `28.499999999999996` in f64 but encodes as 29.
pub fn encode_sentiment(score: f64) -> Result<i32, EncodeError> {
    if !score.is_finite() {
        return Err(EncodeError::NotFinite);
    }
    if score.abs() > 1.0 {
        return Err(EncodeError::OutOfRange(score));
    }
    let snapped = (score * SENTIMENT_SCALE * 1e6).round() / 1e6;
    let v = snapped.round() as i32;
    if !(ENCODED_MIN..=ENCODED_MAX).contains(&v) {
        return Err(EncodeError::OutOfRange(score));
    }
    Ok(v)
}

pub fn decode_sentiment(encoded: i32) -> f64 {
    f64::from(encoded) / SENTIMENT_SCALE
}
