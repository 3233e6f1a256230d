//! NATS ingestion: platform events mirrored onto `<prefix>.<name>` subjects
//! become hub broadcasts with the event name as the channel, so realtime
//! clients subscribe to the channels they care about (`user.login`,
//! `security.access_denied`, …).

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::hub::WireMessage;
use crate::state::AppState;

pub async fn run_nats_ingest(state: AppState) -> anyhow::Result<()> {
  let messaging = &state.config.messaging;
  let client = async_nats::connect(&messaging.nats_url).await?;
  let subject = format!("{}.>", messaging.subject_prefix);
  let mut subscriber = client.subscribe(subject.clone()).await?;
  info!("subscribed to NATS subject {}", subject);

  let prefix = format!("{}.", messaging.subject_prefix);
  let shutdown: CancellationToken = state.shutdown_token();

  loop {
    tokio::select! {
      _ = shutdown.cancelled() => {
        info!("NATS ingest stopping");
        break;
      }
      message = subscriber.next() => {
        let Some(message) = message else {
          warn!("NATS subscription closed");
          break;
        };

        let Some(channel) = message.subject.strip_prefix(&prefix) else {
          continue;
        };
        let data: serde_json::Value = match serde_json::from_slice(&message.payload) {
          Ok(data) => data,
          Err(e) => {
            warn!("dropping malformed event payload on {}: {}", message.subject, e);
            continue;
          }
        };

        state
          .hub
          .broadcast(WireMessage::event(channel.to_string(), data));
      }
    }
  }

  Ok(())
}
