//! Bastion identity server: credential and challenge engine, token/session
//! lifecycle, authorization resolution and the request admission pipeline.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middlewares;
pub mod migrations;
pub mod services;
pub mod state;

#[cfg(test)]
pub mod test_utils;

use axum::{
  routing::{get, post, put},
  Router,
};

pub use config::AppConfig;
pub use error::{AppError, ErrorOutput};
pub use state::{AppState, Wiring};

use middlewares::RouterExt;

/// Assemble the full route tree under the admission pipeline.
pub fn get_router(state: AppState) -> Router {
  let public = Router::new()
    .route("/login", post(handlers::login_handler))
    .route("/login/mfa", post(handlers::mfa_login_handler))
    .route("/register", post(handlers::register_handler))
    .route("/refresh", post(handlers::refresh_handler))
    .route("/logout", post(handlers::logout_handler))
    .route("/authorize/send", post(handlers::send_code_handler))
    .route("/authorize/{code}", get(handlers::exchange_code_handler))
    .route("/captcha/generate", post(handlers::generate_handler))
    .route("/captcha/validate", post(handlers::validate_handler))
    .route("/captcha/{spec}", get(handlers::media_handler));

  let account = Router::new()
    .route("/account", get(handlers::me_handler))
    .route("/account/password", put(handlers::update_password_handler))
    .route("/account/spaces", get(handlers::spaces_handler))
    .route("/account/2fa/status", get(handlers::status_handler))
    .route("/account/2fa/setup", post(handlers::setup_handler))
    .route("/account/2fa/verify", post(handlers::verify_handler))
    .route("/account/2fa/disable", post(handlers::disable_handler))
    .route(
      "/account/2fa/backup-codes",
      get(handlers::backup_codes_handler),
    )
    .route(
      "/account/2fa/backup-codes/regenerate",
      post(handlers::regenerate_backup_codes_handler),
    )
    .route("/sessions", get(handlers::list_sessions_handler))
    .route(
      "/sessions/deactivate-all",
      post(handlers::deactivate_all_handler),
    )
    .route(
      "/sessions/{id}",
      get(handlers::get_session_handler).delete(handlers::delete_session_handler),
    )
    .with_auth();

  Router::new()
    .nest("/api/v1", public.merge(account))
    .route("/healthz", get(handlers::health_handler))
    .with_admission(state.clone())
    .with_state(state)
}
