//! Realtime fan-out service: a single-writer WebSocket hub fed by platform
//! events over NATS and an admin broadcast endpoint.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod hub;
pub mod state;

use anyhow::Result;
use axum::{middleware::from_fn_with_state, routing::get, routing::post, Router};
use tracing::{error, info};

pub use config::AppConfig;
pub use error::RealtimeError;
pub use state::AppState;

use bastion_core::middlewares::{verify_query_token_middleware, verify_token_middleware};

pub async fn get_router(config: AppConfig) -> Result<Router> {
  let state = AppState::try_new(config)?;

  if state.config.messaging.enabled {
    let ingest_state = state.clone();
    tokio::spawn(async move {
      if let Err(e) = events::run_nats_ingest(ingest_state).await {
        error!("NATS ingest failed: {}", e);
      }
    });
  } else {
    info!("messaging disabled; hub serves only direct broadcasts");
  }

  // Browsers cannot set headers on WebSocket upgrades, so /ws authenticates
  // through `?token=`
  let ws_routes = Router::new()
    .route("/ws", get(client::ws_handler))
    .layer(from_fn_with_state(
      state.clone(),
      verify_query_token_middleware::<AppState>,
    ));

  let api_routes = Router::new()
    .route("/online-users", get(handlers::online_users_handler))
    .route("/broadcast", post(handlers::broadcast_handler))
    .layer(from_fn_with_state(
      state.clone(),
      verify_token_middleware::<AppState>,
    ));

  let public_routes = Router::new().route("/health", get(handlers::health_handler));

  Ok(
    Router::new()
      .merge(ws_routes)
      .merge(api_routes)
      .merge(public_routes)
      .with_state(state),
  )
}
