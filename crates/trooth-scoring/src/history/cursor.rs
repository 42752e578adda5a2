use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// URL-safe, padded on encode, padding-agnostic on decode.
const CURSOR_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Continuation point in `(created_at DESC, id DESC)` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    ts: String,
    id: String,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode(self.created_at, &self.id)
    }
}

/// Serializes `{ts, id}` into an opaque token.
pub fn encode(created_at: DateTime<Utc>, id: &str) -> String {
    let payload = CursorPayload {
        ts: created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        id: id.to_string(),
    };
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    CURSOR_ENGINE.encode(json)
}

/// Recovers the `(timestamp, id)` pair from a token.
pub fn decode(token: &str) -> Result<Cursor, CursorError> {
    let bytes = CURSOR_ENGINE
        .decode(token.trim())
        .map_err(|_| CursorError::invalid("token is not valid base64"))?;
    let payload: CursorPayload = serde_json::from_slice(&bytes)
        .map_err(|_| CursorError::invalid("token does not contain a ts/id payload"))?;
    let created_at = parse_timestamp(&payload.ts)
        .ok_or_else(|| CursorError::invalid("cursor timestamp is not parsable"))?;
    Ok(Cursor {
        created_at,
        id: payload.id,
    })
}

/// RFC 3339 with offset; offset-less ISO timestamps are read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(&'static str),
}

impl CursorError {
    fn invalid(reason: &'static str) -> Self {
        CursorError::InvalidCursor(reason)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            CursorError::InvalidCursor(reason) => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trips_timestamp_and_id() {
        let ts = Utc
            .with_ymd_and_hms(2025, 3, 14, 9, 26, 53)
            .single()
            .expect("valid timestamp")
            + chrono::Duration::microseconds(589_793);
        let token = encode(ts, "a-42");
        let cursor = decode(&token).expect("token decodes");
        assert_eq!(cursor, Cursor::new(ts, "a-42"));
    }

    #[test]
    fn empty_id_survives_a_round_trip() {
        let ts = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        let cursor = decode(&encode(ts, "")).expect("token decodes");
        assert_eq!(cursor, Cursor::new(ts, ""));
    }

    #[test]
    fn token_is_url_safe() {
        let ts = Utc::now();
        let token = encode(ts, "??>>~~id with spaces");
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn accepts_unpadded_tokens_and_naive_timestamps() {
        let token = CURSOR_ENGINE.encode(br#"{"ts":"2025-01-02T03:04:05.123456","id":"x"}"#);
        let cursor = decode(token.trim_end_matches('=')).expect("unpadded token decodes");
        assert_eq!(cursor.id, "x");
        assert_eq!(cursor.created_at.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn rejects_garbage_and_tampered_tokens() {
        assert!(decode("not a cursor!").is_err());

        let missing_id = CURSOR_ENGINE.encode(br#"{"ts":"2025-01-02T03:04:05Z"}"#);
        assert_eq!(
            decode(&missing_id).unwrap_err().reason(),
            "token does not contain a ts/id payload"
        );

        let bad_ts = CURSOR_ENGINE.encode(br#"{"ts":"yesterday","id":"x"}"#);
        assert_eq!(
            decode(&bad_ts).unwrap_err().reason(),
            "cursor timestamp is not parsable"
        );
    }
}
