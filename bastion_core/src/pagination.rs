//! Opaque cursors for keyset pagination over `(created_at, id)`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Position within a listing, ordered by `(created_at, id)` with the id as
/// tiebreak. Serialized as base64(JSON) so clients treat it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
  /// Microseconds since epoch; microsecond precision survives Postgres round trips
  pub created_at_micros: i64,
  pub id: String,
}

impl Cursor {
  pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
    Self {
      created_at_micros: created_at.timestamp_micros(),
      id: id.into(),
    }
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    Utc
      .timestamp_micros(self.created_at_micros)
      .single()
      .unwrap_or_else(Utc::now)
  }

  pub fn encode(&self) -> String {
    // Serializing two primitive fields cannot fail
    B64.encode(serde_json::to_vec(self).expect("cursor serialization"))
  }

  pub fn decode(token: &str) -> Result<Self, CoreError> {
    let bytes = B64
      .decode(token)
      .map_err(|_| CoreError::InvalidRequest("malformed cursor".to_string()))?;
    serde_json::from_slice(&bytes)
      .map_err(|_| CoreError::InvalidRequest("malformed cursor".to_string()))
  }
}
