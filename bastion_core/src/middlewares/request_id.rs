use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// HTTP header for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates and propagates a unique request id per request. An incoming
/// x-request-id header wins; otherwise a fresh UUID v4 is attached to both
/// the request and the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
  let req_id = match req.headers().get(REQUEST_ID_HEADER) {
    Some(existing) => Some(existing.clone()),
    None => HeaderValue::from_str(&Uuid::new_v4().to_string())
      .ok()
      .map(|hv| {
        req.headers_mut().insert(REQUEST_ID_HEADER, hv.clone());
        hv
      }),
  };

  let mut response = next.run(req).await;
  if let Some(id) = req_id {
    response.headers_mut().insert(REQUEST_ID_HEADER, id);
  }
  response
}
