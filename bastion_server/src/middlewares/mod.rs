//! The request admission pipeline: recovery, logging, request ids,
//! credential and scope consumption, content-type validation, permission
//! gates, policy authorization and session bookkeeping — assembled in that
//! order around every mounted route.

mod consume_scope;
mod consume_user;
mod gates;
mod request_logging;
mod whitelist;

use axum::{
  http::StatusCode,
  middleware::{from_fn, from_fn_with_state},
  response::IntoResponse,
  Json, Router,
};
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;

use bastion_core::middlewares::request_id_middleware;

use crate::error::ErrorOutput;
use crate::state::AppState;

pub use consume_scope::{consume_scope, SPACE_HEADER};
pub use consume_user::{consume_user, SessionBinding, RENEWED_TOKEN_HEADER};
pub use gates::{
  owner_or_manager, policy_authorize, require_admin, require_any_permission, require_any_role,
  require_auth, require_permission, require_request_permission, require_role, require_space,
  session_bookkeeping, validate_content_type,
};
pub use request_logging::request_logging;
pub use whitelist::is_whitelisted;

fn panic_response(err: Box<dyn Any + Send + 'static>) -> axum::response::Response {
  let detail = if let Some(s) = err.downcast_ref::<String>() {
    s.clone()
  } else if let Some(s) = err.downcast_ref::<&str>() {
    (*s).to_string()
  } else {
    "opaque panic payload".to_string()
  };
  tracing::error!("request handler panicked: {}", detail);

  (
    StatusCode::INTERNAL_SERVER_ERROR,
    Json(ErrorOutput::new(
      StatusCode::INTERNAL_SERVER_ERROR,
      "internal server error",
    )),
  )
    .into_response()
}

/// Route-level helpers applying the admission pipeline and its gates
pub trait RouterExt<S> {
  /// The full pipeline, outermost recovery first
  fn with_admission(self, state: AppState) -> Self;

  fn with_auth(self) -> Self;

  fn with_space(self) -> Self;

  fn with_permission(self, state: AppState, code: &'static str) -> Self;

  fn with_any_permission(self, state: AppState, codes: &'static [&'static str]) -> Self;

  fn with_role(self, state: AppState, slug: &'static str) -> Self;

  fn with_any_role(self, state: AppState, slugs: &'static [&'static str]) -> Self;

  fn with_admin(self, state: AppState) -> Self;

  /// Policy-engine authorization for mounted resource routes
  fn with_policy(self, state: AppState) -> Self;

  /// Gate on the permission code derived from the request itself
  fn with_request_permission(self, state: AppState) -> Self;

  /// Admit admins, owner/manager role holders, or the targeted user
  fn with_owner_or_manager(self, state: AppState) -> Self;
}

impl<S> RouterExt<S> for Router<S>
where
  S: Clone + Send + Sync + 'static,
{
  fn with_admission(self, state: AppState) -> Self {
    self.layer(
      ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn(request_logging))
        .layer(from_fn(request_id_middleware))
        .layer(CompressionLayer::new().gzip(true))
        .layer(from_fn_with_state(state.clone(), consume_user))
        .layer(from_fn_with_state(state.clone(), consume_scope))
        .layer(from_fn(validate_content_type))
        .layer(from_fn_with_state(state, session_bookkeeping)),
    )
  }

  fn with_auth(self) -> Self {
    self.layer(from_fn(require_auth))
  }

  fn with_space(self) -> Self {
    self.layer(from_fn(require_space))
  }

  fn with_permission(self, state: AppState, code: &'static str) -> Self {
    self.layer(from_fn_with_state((state, code), require_permission))
  }

  fn with_any_permission(self, state: AppState, codes: &'static [&'static str]) -> Self {
    self.layer(from_fn_with_state((state, codes), require_any_permission))
  }

  fn with_role(self, state: AppState, slug: &'static str) -> Self {
    self.layer(from_fn_with_state((state, slug), require_role))
  }

  fn with_any_role(self, state: AppState, slugs: &'static [&'static str]) -> Self {
    self.layer(from_fn_with_state((state, slugs), require_any_role))
  }

  fn with_admin(self, state: AppState) -> Self {
    self.layer(from_fn_with_state(state, require_admin))
  }

  fn with_policy(self, state: AppState) -> Self {
    self.layer(from_fn_with_state(state, policy_authorize))
  }

  fn with_request_permission(self, state: AppState) -> Self {
    self.layer(from_fn_with_state(state, require_request_permission))
  }

  fn with_owner_or_manager(self, state: AppState) -> Self {
    self.layer(from_fn_with_state(state, owner_or_manager))
  }
}
