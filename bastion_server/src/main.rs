use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use bastion_server::{get_router, AppConfig, AppState, Wiring};

#[tokio::main]
async fn main() -> Result<()> {
  let layer = tracing_subscriber::fmt::layer()
    .with_span_events(FmtSpan::CLOSE)
    .with_filter(tracing_subscriber::EnvFilter::from_default_env());
  tracing_subscriber::registry().with(layer).init();

  let config = AppConfig::load()?;
  let addr = format!("0.0.0.0:{}", config.server.port);

  // Policy engine and captcha renderer are deployment-provided; the default
  // wiring runs without them (see Wiring to inject implementations).
  let state = AppState::try_new_with(config, Wiring::default()).await?;
  let app = get_router(state.clone());

  let listener = TcpListener::bind(&addr).await?;
  info!("bastion server listening on {}", addr);

  axum::serve(listener, app.into_make_service())
    .with_graceful_shutdown(async move {
      let _ = tokio::signal::ctrl_c().await;
      info!("shutdown signal received");
      state.shutdown();
    })
    .await?;

  Ok(())
}
