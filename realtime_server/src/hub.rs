//! The fan-out hub: arbitrarily many WebSocket clients, three routing maps,
//! one writer.
//!
//! All three maps are mutated only by the event-loop task draining the
//! command channel, so mutation is totally ordered; read methods take reader
//! locks and may run concurrently. Each client owns a bounded send queue fed
//! exclusively by the loop — a full queue drops that one client without ever
//! blocking delivery to the others.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use bastion_core::models::UserId;

use crate::config::LimitsConfig;

/// Inbound and outbound frame shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub channel: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<serde_json::Value>,
}

impl WireMessage {
  pub fn event(channel: impl Into<String>, data: serde_json::Value) -> Self {
    Self {
      kind: "event".to_string(),
      channel: Some(channel.into()),
      data: Some(data),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl ClientId {
  fn generate() -> Self {
    Self(Uuid::new_v4().to_string())
  }
}

impl fmt::Display for ClientId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

struct ClientEntry {
  user_id: UserId,
  sender: mpsc::Sender<String>,
  subscriptions: HashSet<String>,
  last_ping: Instant,
}

/// Snapshot of a client for the read API
#[derive(Debug, Clone)]
pub struct ClientInfo {
  pub id: ClientId,
  pub user_id: UserId,
  pub subscriptions: Vec<String>,
}

enum Command {
  Register {
    id: ClientId,
    user_id: UserId,
    sender: mpsc::Sender<String>,
  },
  Unregister {
    id: ClientId,
  },
  Subscribe {
    id: ClientId,
    channel: String,
  },
  Unsubscribe {
    id: ClientId,
    channel: String,
  },
  Touch {
    id: ClientId,
  },
  Broadcast {
    message: WireMessage,
  },
  SendToUser {
    user_id: UserId,
    message: WireMessage,
  },
}

pub struct Hub {
  clients: RwLock<HashMap<ClientId, ClientEntry>>,
  by_user: RwLock<HashMap<UserId, HashSet<ClientId>>>,
  by_channel: RwLock<HashMap<String, HashSet<ClientId>>>,
  tx: mpsc::UnboundedSender<Command>,
  send_queue_capacity: usize,
}

impl Hub {
  /// Build the hub and spawn its event loop; the loop exits when `shutdown`
  /// fires.
  pub fn start(limits: &LimitsConfig, shutdown: CancellationToken) -> Arc<Self> {
    let (tx, rx) = mpsc::unbounded_channel();
    let hub = Arc::new(Self {
      clients: RwLock::new(HashMap::new()),
      by_user: RwLock::new(HashMap::new()),
      by_channel: RwLock::new(HashMap::new()),
      tx,
      send_queue_capacity: limits.send_queue_capacity,
    });

    tokio::spawn(Self::run(
      hub.clone(),
      rx,
      limits.stale_after(),
      limits.sweep_interval(),
      shutdown,
    ));
    hub
  }

  // ---- command API (enqueue; the loop applies) ----

  /// Attach a client. Returns its id and the receiving end of its bounded
  /// send queue; the queue closing means the hub dropped the client.
  pub fn register(&self, user_id: UserId) -> (ClientId, mpsc::Receiver<String>) {
    let id = ClientId::generate();
    let (sender, receiver) = mpsc::channel(self.send_queue_capacity);
    let _ = self.tx.send(Command::Register {
      id: id.clone(),
      user_id,
      sender,
    });
    (id, receiver)
  }

  pub fn unregister(&self, id: &ClientId) {
    let _ = self.tx.send(Command::Unregister { id: id.clone() });
  }

  pub fn subscribe(&self, id: &ClientId, channel: impl Into<String>) {
    let _ = self.tx.send(Command::Subscribe {
      id: id.clone(),
      channel: channel.into(),
    });
  }

  pub fn unsubscribe(&self, id: &ClientId, channel: impl Into<String>) {
    let _ = self.tx.send(Command::Unsubscribe {
      id: id.clone(),
      channel: channel.into(),
    });
  }

  pub fn touch(&self, id: &ClientId) {
    let _ = self.tx.send(Command::Touch { id: id.clone() });
  }

  /// Deliver to a channel's subscribers, or to every client when the message
  /// carries no channel. Best-effort, at-most-once per recipient.
  pub fn broadcast(&self, message: WireMessage) {
    let _ = self.tx.send(Command::Broadcast { message });
  }

  pub fn send_to_user(&self, user_id: UserId, message: WireMessage) {
    let _ = self.tx.send(Command::SendToUser { user_id, message });
  }

  // ---- read API (reader locks; safe concurrently with the loop) ----

  pub async fn client_count(&self) -> usize {
    self.clients.read().await.len()
  }

  pub async fn get_client(&self, id: &ClientId) -> Option<ClientInfo> {
    self.clients.read().await.get(id).map(|entry| ClientInfo {
      id: id.clone(),
      user_id: entry.user_id.clone(),
      subscriptions: entry.subscriptions.iter().cloned().collect(),
    })
  }

  pub async fn is_user_online(&self, user_id: &UserId) -> bool {
    self.by_user.read().await.contains_key(user_id)
  }

  pub async fn online_users(&self) -> Vec<UserId> {
    self.by_user.read().await.keys().cloned().collect()
  }

  pub async fn channel_subscriber_count(&self, channel: &str) -> usize {
    self
      .by_channel
      .read()
      .await
      .get(channel)
      .map_or(0, |s| s.len())
  }

  // ---- the single writer ----

  async fn run(
    hub: Arc<Self>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    stale_after: std::time::Duration,
    sweep_interval: std::time::Duration,
    shutdown: CancellationToken,
  ) {
    let mut sweeper = tokio::time::interval(sweep_interval);
    sweeper.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = shutdown.cancelled() => {
          info!("hub event loop stopping");
          break;
        }
        _ = sweeper.tick() => {
          hub.sweep_stale(stale_after).await;
        }
        command = rx.recv() => {
          match command {
            Some(command) => hub.apply(command).await,
            None => break,
          }
        }
      }
    }
  }

  async fn apply(&self, command: Command) {
    match command {
      Command::Register { id, user_id, sender } => {
        debug!("client {} registered for user {}", id, user_id);
        self
          .by_user
          .write()
          .await
          .entry(user_id.clone())
          .or_default()
          .insert(id.clone());
        self.clients.write().await.insert(
          id,
          ClientEntry {
            user_id,
            sender,
            subscriptions: HashSet::new(),
            last_ping: Instant::now(),
          },
        );
      }
      Command::Unregister { id } => self.remove_client(&id).await,
      Command::Subscribe { id, channel } => {
        let mut clients = self.clients.write().await;
        let Some(entry) = clients.get_mut(&id) else {
          return;
        };
        entry.subscriptions.insert(channel.clone());
        drop(clients);
        self
          .by_channel
          .write()
          .await
          .entry(channel)
          .or_default()
          .insert(id);
      }
      Command::Unsubscribe { id, channel } => {
        let mut clients = self.clients.write().await;
        if let Some(entry) = clients.get_mut(&id) {
          entry.subscriptions.remove(&channel);
        }
        drop(clients);
        let mut by_channel = self.by_channel.write().await;
        if let Some(subscribers) = by_channel.get_mut(&channel) {
          subscribers.remove(&id);
          if subscribers.is_empty() {
            by_channel.remove(&channel);
          }
        }
      }
      Command::Touch { id } => {
        if let Some(entry) = self.clients.write().await.get_mut(&id) {
          entry.last_ping = Instant::now();
        }
      }
      Command::Broadcast { message } => {
        let Some(encoded) = encode(&message) else {
          return;
        };
        let targets: Vec<ClientId> = match &message.channel {
          Some(channel) if !channel.is_empty() => self
            .by_channel
            .read()
            .await
            .get(channel)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default(),
          _ => self.clients.read().await.keys().cloned().collect(),
        };
        self.deliver(&targets, &encoded).await;
      }
      Command::SendToUser { user_id, message } => {
        let Some(encoded) = encode(&message) else {
          return;
        };
        let targets: Vec<ClientId> = self
          .by_user
          .read()
          .await
          .get(&user_id)
          .map(|s| s.iter().cloned().collect())
          .unwrap_or_default();
        self.deliver(&targets, &encoded).await;
      }
    }
  }

  /// Non-blocking enqueue to each target. A full or closed queue drops that
  /// one client; the rest are unaffected.
  async fn deliver(&self, targets: &[ClientId], encoded: &str) {
    let mut overloaded = Vec::new();
    {
      let clients = self.clients.read().await;
      for id in targets {
        let Some(entry) = clients.get(id) else {
          continue;
        };
        if entry.sender.try_send(encoded.to_string()).is_err() {
          warn!("client {} send queue saturated, dropping client", id);
          overloaded.push(id.clone());
        }
      }
    }

    for id in overloaded {
      self.remove_client(&id).await;
    }
  }

  /// Remove a client from all three maps and close its queue
  async fn remove_client(&self, id: &ClientId) {
    let Some(entry) = self.clients.write().await.remove(id) else {
      return;
    };

    let mut by_user = self.by_user.write().await;
    if let Some(ids) = by_user.get_mut(&entry.user_id) {
      ids.remove(id);
      if ids.is_empty() {
        by_user.remove(&entry.user_id);
      }
    }
    drop(by_user);

    let mut by_channel = self.by_channel.write().await;
    for channel in &entry.subscriptions {
      if let Some(subscribers) = by_channel.get_mut(channel) {
        subscribers.remove(id);
        if subscribers.is_empty() {
          by_channel.remove(channel);
        }
      }
    }

    debug!("client {} removed", id);
    // Dropping the entry drops its sender, closing the client's queue
  }

  async fn sweep_stale(&self, stale_after: std::time::Duration) {
    let now = Instant::now();
    let stale: Vec<ClientId> = self
      .clients
      .read()
      .await
      .iter()
      .filter(|(_, entry)| now.duration_since(entry.last_ping) > stale_after)
      .map(|(id, _)| id.clone())
      .collect();

    for id in stale {
      info!("evicting stale client {}", id);
      self.remove_client(&id).await;
    }
  }
}

fn encode(message: &WireMessage) -> Option<String> {
  match serde_json::to_string(message) {
    Ok(encoded) => Some(encoded),
    Err(e) => {
      warn!("dropping unencodable broadcast: {}", e);
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::time::Duration;

  fn limits(queue: usize) -> LimitsConfig {
    LimitsConfig {
      send_queue_capacity: queue,
      sweep_interval_secs: 30,
      stale_after_secs: 120,
      ..Default::default()
    }
  }

  async fn settle(hub: &Hub) {
    // Let the loop drain pending commands
    for _ in 0..20 {
      tokio::task::yield_now().await;
    }
    let _ = hub.client_count().await;
  }

  #[tokio::test]
  async fn channel_broadcast_reaches_each_subscriber_in_fifo_order() {
    let hub = Hub::start(&limits(16), CancellationToken::new());

    let (a, mut rx_a) = hub.register(UserId::from("u-1"));
    let (b, mut rx_b) = hub.register(UserId::from("u-2"));
    let (c, mut rx_c) = hub.register(UserId::from("u-3"));
    for id in [&a, &b, &c] {
      hub.subscribe(id, "orders");
    }
    settle(&hub).await;

    for i in 0..3 {
      hub.broadcast(WireMessage::event("orders", json!({ "seq": i })));
    }
    settle(&hub).await;

    for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
      for i in 0..3 {
        let frame = rx.recv().await.unwrap();
        let message: WireMessage = serde_json::from_str(&frame).unwrap();
        assert_eq!(message.channel.as_deref(), Some("orders"));
        assert_eq!(message.data.unwrap()["seq"], i);
      }
    }
  }

  #[tokio::test]
  async fn empty_channel_broadcasts_to_everyone() {
    let hub = Hub::start(&limits(16), CancellationToken::new());

    let (_a, mut rx_a) = hub.register(UserId::from("u-1"));
    let (_b, mut rx_b) = hub.register(UserId::from("u-2"));
    settle(&hub).await;

    hub.broadcast(WireMessage {
      kind: "announce".to_string(),
      channel: None,
      data: Some(json!({"hello": true})),
    });
    settle(&hub).await;

    assert!(rx_a.recv().await.is_some());
    assert!(rx_b.recv().await.is_some());
  }

  #[tokio::test]
  async fn per_user_send_hits_every_connection_of_that_user() {
    let hub = Hub::start(&limits(16), CancellationToken::new());

    let (_a1, mut rx_a1) = hub.register(UserId::from("u-1"));
    let (_a2, mut rx_a2) = hub.register(UserId::from("u-1"));
    let (_b, mut rx_b) = hub.register(UserId::from("u-2"));
    settle(&hub).await;

    hub.send_to_user(UserId::from("u-1"), WireMessage::event("", json!(1)));
    settle(&hub).await;

    assert!(rx_a1.recv().await.is_some());
    assert!(rx_a2.recv().await.is_some());
    assert!(rx_b.try_recv().is_err());
  }

  #[tokio::test]
  async fn overloaded_client_is_dropped_without_blocking_the_rest() {
    let hub = Hub::start(&limits(1), CancellationToken::new());

    let (a, mut rx_a) = hub.register(UserId::from("u-1"));
    let (b, _rx_b) = hub.register(UserId::from("u-2"));
    let (c, mut rx_c) = hub.register(UserId::from("u-3"));
    for id in [&a, &b, &c] {
      hub.subscribe(id, "orders");
    }
    settle(&hub).await;

    // First frame fills everyone's single-slot queue; b never drains
    hub.broadcast(WireMessage::event("orders", json!({"seq": 0})));
    settle(&hub).await;
    assert!(rx_a.recv().await.is_some());
    assert!(rx_c.recv().await.is_some());

    // Second frame overflows b, which gets unregistered; a and c receive
    hub.broadcast(WireMessage::event("orders", json!({"seq": 1})));
    settle(&hub).await;

    assert!(rx_a.recv().await.is_some());
    assert!(rx_c.recv().await.is_some());
    assert!(hub.get_client(&b).await.is_none());
    assert_eq!(hub.client_count().await, 2);
    assert_eq!(hub.channel_subscriber_count("orders").await, 2);
  }

  #[tokio::test]
  async fn unregister_clears_all_three_maps() {
    let hub = Hub::start(&limits(16), CancellationToken::new());

    let (a, mut rx_a) = hub.register(UserId::from("u-1"));
    hub.subscribe(&a, "orders");
    hub.subscribe(&a, "alerts");
    settle(&hub).await;

    assert!(hub.is_user_online(&UserId::from("u-1")).await);
    assert_eq!(hub.channel_subscriber_count("orders").await, 1);

    hub.unregister(&a);
    settle(&hub).await;

    assert_eq!(hub.client_count().await, 0);
    assert!(!hub.is_user_online(&UserId::from("u-1")).await);
    assert_eq!(hub.channel_subscriber_count("orders").await, 0);
    assert_eq!(hub.channel_subscriber_count("alerts").await, 0);
    // Closing the queue is how the connection task learns it was dropped
    assert!(rx_a.recv().await.is_none());
  }

  #[tokio::test]
  async fn unsubscribe_stops_channel_delivery() {
    let hub = Hub::start(&limits(16), CancellationToken::new());

    let (a, mut rx_a) = hub.register(UserId::from("u-1"));
    hub.subscribe(&a, "orders");
    settle(&hub).await;
    hub.unsubscribe(&a, "orders");
    settle(&hub).await;

    hub.broadcast(WireMessage::event("orders", json!(1)));
    settle(&hub).await;
    assert!(rx_a.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn sweeper_evicts_silent_clients_and_keeps_fresh_ones() {
    let hub = Hub::start(
      &LimitsConfig {
        send_queue_capacity: 16,
        sweep_interval_secs: 30,
        stale_after_secs: 120,
        ..Default::default()
      },
      CancellationToken::new(),
    );

    let (a, _rx_a) = hub.register(UserId::from("u-1"));
    let (_b, _rx_b) = hub.register(UserId::from("u-2"));
    settle(&hub).await;
    assert_eq!(hub.client_count().await, 2);

    // Keep a alive with pings while b stays silent past the 2 min window
    for _ in 0..5 {
      tokio::time::advance(Duration::from_secs(30)).await;
      hub.touch(&a);
      settle(&hub).await;
    }

    assert_eq!(hub.client_count().await, 1);
    assert!(hub.get_client(&a).await.is_some());
  }

  #[tokio::test]
  async fn broadcast_to_unknown_channel_is_a_no_op() {
    let hub = Hub::start(&limits(16), CancellationToken::new());
    let (_a, mut rx_a) = hub.register(UserId::from("u-1"));
    settle(&hub).await;

    hub.broadcast(WireMessage::event("nobody-listens", json!(1)));
    settle(&hub).await;
    assert!(rx_a.try_recv().is_err());
  }
}
