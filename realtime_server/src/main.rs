use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use realtime_server::{get_router, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
  let layer = tracing_subscriber::fmt::layer()
    .with_filter(tracing_subscriber::EnvFilter::from_default_env());
  tracing_subscriber::registry().with(layer).init();

  let config = AppConfig::load()?;
  let addr = format!("0.0.0.0:{}", config.server.port);

  let app = get_router(config).await?;
  let listener = TcpListener::bind(&addr).await?;
  info!("realtime server listening on {}", addr);

  axum::serve(listener, app.into_make_service()).await?;

  Ok(())
}
