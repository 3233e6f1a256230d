//! The extension bus: an in-process dispatcher with an optional NATS mirror.
//!
//! Handlers registered through `subscribe` run as spawned tasks so a slow or
//! panicking handler never blocks the publisher. When messaging is enabled,
//! every event is additionally mirrored onto `<prefix>.<name>` NATS subjects
//! for out-of-process consumers such as the realtime server.

use async_nats::Client as NatsClient;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use bastion_core::contracts::{EventBus, EventHandler};
use bastion_core::CoreError;

pub struct InProcessEventBus {
  handlers: DashMap<String, Vec<EventHandler>>,
  nats: Option<NatsMirror>,
}

struct NatsMirror {
  client: NatsClient,
  subject_prefix: String,
}

impl InProcessEventBus {
  pub fn new() -> Self {
    Self {
      handlers: DashMap::new(),
      nats: None,
    }
  }

  pub async fn with_nats(nats_url: &str, subject_prefix: &str) -> Result<Self, CoreError> {
    let client = async_nats::connect(nats_url)
      .await
      .map_err(|e| CoreError::Internal(format!("NATS connection failed: {}", e)))?;
    info!("event bus connected to NATS at {}", nats_url);

    Ok(Self {
      handlers: DashMap::new(),
      nats: Some(NatsMirror {
        client,
        subject_prefix: subject_prefix.to_string(),
      }),
    })
  }
}

impl Default for InProcessEventBus {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl EventBus for InProcessEventBus {
  async fn publish(&self, name: &str, payload: serde_json::Value) -> Result<(), CoreError> {
    if let Some(handlers) = self.handlers.get(name) {
      for handler in handlers.iter() {
        let handler = Arc::clone(handler);
        let payload = payload.clone();
        tokio::spawn(async move {
          handler(payload).await;
        });
      }
    }

    if let Some(mirror) = &self.nats {
      let subject = format!("{}.{}", mirror.subject_prefix, name);
      let bytes = serde_json::to_vec(&payload)?;
      if let Err(e) = mirror.client.publish(subject.clone(), bytes.into()).await {
        // Mirroring is best-effort; local handlers already ran
        error!("failed to mirror event {} to NATS: {}", subject, e);
      }
    }

    Ok(())
  }

  fn subscribe(&self, name: &str, handler: EventHandler) {
    self
      .handlers
      .entry(name.to_string())
      .or_default()
      .push(handler);
  }
}

/// Subscribe with a typed payload; deserialization failures are logged and
/// dropped instead of reaching the handler.
pub fn subscribe_typed<T, F, Fut>(bus: &dyn EventBus, name: &'static str, handler: F)
where
  T: serde::de::DeserializeOwned + Send + 'static,
  F: Fn(T) -> Fut + Send + Sync + 'static,
  Fut: std::future::Future<Output = ()> + Send + 'static,
{
  let handler = Arc::new(handler);
  bus.subscribe(
    name,
    Arc::new(move |payload| {
      let handler = Arc::clone(&handler);
      Box::pin(async move {
        match serde_json::from_value::<T>(payload) {
          Ok(event) => handler(event).await,
          Err(e) => warn!("dropping malformed {} event: {}", name, e),
        }
      })
    }),
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::Notify;

  #[tokio::test]
  async fn handlers_receive_published_events() {
    let bus = InProcessEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let notify = Arc::new(Notify::new());

    let seen_clone = seen.clone();
    let notify_clone = notify.clone();
    bus.subscribe(
      "user.login",
      Arc::new(move |_| {
        let seen = seen_clone.clone();
        let notify = notify_clone.clone();
        Box::pin(async move {
          seen.fetch_add(1, Ordering::SeqCst);
          notify.notify_one();
        })
      }),
    );

    bus
      .publish("user.login", serde_json::json!({"user_id": "u-1"}))
      .await
      .unwrap();
    notify.notified().await;

    assert_eq!(seen.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn events_only_reach_their_own_subscribers() {
    let bus = InProcessEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));

    let seen_clone = seen.clone();
    bus.subscribe(
      "user.created",
      Arc::new(move |_| {
        let seen = seen_clone.clone();
        Box::pin(async move {
          seen.fetch_add(1, Ordering::SeqCst);
        })
      }),
    );

    bus
      .publish("user.login", serde_json::json!({}))
      .await
      .unwrap();
    tokio::task::yield_now().await;

    assert_eq!(seen.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn typed_subscription_drops_malformed_payloads() {
    #[derive(Deserialize)]
    struct Typed {
      #[allow(dead_code)]
      user_id: String,
    }

    let bus = InProcessEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let notify = Arc::new(Notify::new());

    let seen_clone = seen.clone();
    let notify_clone = notify.clone();
    subscribe_typed::<Typed, _, _>(&bus, "user.login", move |_event| {
      let seen = seen_clone.clone();
      let notify = notify_clone.clone();
      async move {
        seen.fetch_add(1, Ordering::SeqCst);
        notify.notify_one();
      }
    });

    // Malformed: user_id has the wrong type
    bus
      .publish("user.login", serde_json::json!({"user_id": 42}))
      .await
      .unwrap();
    tokio::task::yield_now().await;
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    bus
      .publish("user.login", serde_json::json!({"user_id": "u-1"}))
      .await
      .unwrap();
    notify.notified().await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
  }
}
