//! Request logging with a bounded body preview: binary payloads are
//! summarized, JSON is compacted, and everything else is truncated.

use axum::{
  body::{to_bytes, Body},
  extract::Request,
  middleware::Next,
  response::Response,
};
use bytes::Bytes;
use std::time::Instant;
use tracing::info;

const PREVIEW_LIMIT: usize = 2048;
const BUFFER_LIMIT: usize = 256 * 1024;

pub async fn request_logging(req: Request<Body>, next: Next) -> Response {
  let method = req.method().clone();
  let uri = req.uri().clone();
  let started = Instant::now();

  // Buffer small mutating bodies for the preview; bodies declaring more
  // than the buffer limit pass through untouched and are only counted.
  let mutating = matches!(method.as_str(), "POST" | "PUT" | "PATCH");
  let declared_length = req
    .headers()
    .get("content-length")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.parse::<usize>().ok());

  let (req, preview) = if mutating && declared_length.map_or(true, |len| len <= BUFFER_LIMIT) {
    let (parts, body) = req.into_parts();
    match to_bytes(body, BUFFER_LIMIT).await {
      Ok(bytes) => {
        let preview = body_preview(&bytes);
        (
          Request::from_parts(parts, Body::from(bytes)),
          Some(preview),
        )
      }
      Err(e) => {
        tracing::warn!(%method, %uri, "failed to buffer request body: {}", e);
        (
          Request::from_parts(parts, Body::empty()),
          Some("<unreadable body>".to_string()),
        )
      }
    }
  } else if mutating {
    let note = declared_length
      .map(|len| format!("<{} bytes not buffered>", len))
      .unwrap_or_default();
    (req, Some(note))
  } else {
    (req, None)
  };

  let response = next.run(req).await;
  let latency = started.elapsed();

  match preview {
    Some(preview) if !preview.is_empty() => info!(
      %method,
      %uri,
      status = response.status().as_u16(),
      latency_ms = latency.as_millis() as u64,
      body = %preview,
      "request"
    ),
    _ => info!(
      %method,
      %uri,
      status = response.status().as_u16(),
      latency_ms = latency.as_millis() as u64,
      "request"
    ),
  }

  response
}

fn body_preview(bytes: &Bytes) -> String {
  if bytes.is_empty() {
    return String::new();
  }

  if looks_binary(bytes) {
    return format!("<{} bytes of binary data>", bytes.len());
  }

  let text = String::from_utf8_lossy(bytes);
  // Compact JSON so multi-line payloads fit one log line
  if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
    let compact = redact_sensitive(value);
    let rendered = serde_json::to_string(&compact).unwrap_or_else(|_| text.into_owned());
    return rendered.chars().take(PREVIEW_LIMIT).collect();
  }

  text.chars().take(PREVIEW_LIMIT).collect()
}

fn looks_binary(bytes: &Bytes) -> bool {
  bytes
    .iter()
    .take(512)
    .any(|&b| b == 0 || (b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t')))
}

const SENSITIVE_FIELDS: [&str; 5] = [
  "password",
  "old_password",
  "new_password",
  "code",
  "recovery_code",
];

fn redact_sensitive(value: serde_json::Value) -> serde_json::Value {
  match value {
    serde_json::Value::Object(map) => serde_json::Value::Object(
      map
        .into_iter()
        .map(|(k, v)| {
          if SENSITIVE_FIELDS.contains(&k.as_str()) {
            (k, serde_json::Value::String("<redacted>".to_string()))
          } else {
            (k, redact_sensitive(v))
          }
        })
        .collect(),
    ),
    serde_json::Value::Array(items) => {
      serde_json::Value::Array(items.into_iter().map(redact_sensitive).collect())
    }
    other => other,
  }
}
