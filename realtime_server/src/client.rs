//! Per-connection protocol tasks. The read side enforces the ping deadline
//! and feeds subscription changes to the hub; the write side drains the
//! client's bounded queue and emits server pings. Any read or write error
//! moves the client to closing: it is removed from the hub and the socket
//! is shut.

use axum::{
  extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    State,
  },
  response::IntoResponse,
  Extension,
};
use futures::{SinkExt, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use bastion_core::models::AuthUser;

use crate::hub::WireMessage;
use crate::state::AppState;

pub async fn ws_handler(
  State(state): State<AppState>,
  Extension(user): Extension<AuthUser>,
  ws: WebSocketUpgrade,
) -> impl IntoResponse {
  let limits = state.config.limits.clone();
  ws.max_frame_size(limits.max_frame_bytes)
    .max_message_size(limits.max_frame_bytes)
    .on_upgrade(move |socket| handle_socket(state, user, socket))
}

async fn handle_socket(state: AppState, user: AuthUser, socket: WebSocket) {
  let limits = state.config.limits.clone();
  let (client_id, mut queue) = state.hub.register(user.id.clone());
  info!("websocket client {} connected for user {}", client_id, user.id);

  let (mut sink, mut stream) = socket.split();

  // Writer: drains the hub queue and pings on a fixed cadence. Each write
  // gets its own deadline; a slow peer kills only this connection.
  let write_timeout = limits.write_timeout();
  let mut ping_interval = tokio::time::interval(limits.ping_interval());
  ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

  let writer = tokio::spawn(async move {
    loop {
      tokio::select! {
        frame = queue.recv() => {
          let Some(frame) = frame else {
            // The hub dropped this client; close the socket
            let _ = sink.send(Message::Close(None)).await;
            break;
          };
          match timeout(write_timeout, sink.send(Message::Text(frame.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
              debug!("websocket write failed: {}", e);
              break;
            }
            Err(_) => {
              warn!("websocket write deadline exceeded");
              break;
            }
          }
        }
        _ = ping_interval.tick() => {
          match timeout(write_timeout, sink.send(Message::Ping(Vec::new().into()))).await {
            Ok(Ok(())) => {}
            _ => break,
          }
        }
      }
    }
  });

  // Reader: every frame extends the read deadline; silence past the deadline
  // closes the connection.
  let read_timeout = limits.read_timeout();
  loop {
    let frame = match timeout(read_timeout, stream.next()).await {
      Ok(Some(Ok(frame))) => frame,
      Ok(Some(Err(e))) => {
        debug!("websocket read failed for {}: {}", client_id, e);
        break;
      }
      Ok(None) => break,
      Err(_) => {
        info!("websocket client {} read deadline expired", client_id);
        break;
      }
    };

    match frame {
      Message::Text(text) => handle_text(&state, &client_id, text.as_str()),
      Message::Pong(_) => state.hub.touch(&client_id),
      Message::Ping(_) => {
        // axum answers pings automatically; just note the liveness
        state.hub.touch(&client_id);
      }
      Message::Close(_) => break,
      Message::Binary(_) => {
        debug!("ignoring binary frame from {}", client_id);
      }
    }
  }

  state.hub.unregister(&client_id);
  writer.abort();
  info!("websocket client {} disconnected", client_id);
}

fn handle_text(state: &AppState, client_id: &crate::hub::ClientId, text: &str) {
  let message: WireMessage = match serde_json::from_str(text) {
    Ok(message) => message,
    Err(e) => {
      debug!("ignoring malformed frame from {}: {}", client_id, e);
      return;
    }
  };

  match message.kind.as_str() {
    "ping" => state.hub.touch(client_id),
    "subscribe" => {
      if let Some(channel) = message.channel.filter(|c| !c.is_empty()) {
        state.hub.subscribe(client_id, channel);
      }
    }
    "unsubscribe" => {
      if let Some(channel) = message.channel.filter(|c| !c.is_empty()) {
        state.hub.unsubscribe(client_id, channel);
      }
    }
    other => debug!("ignoring unknown message type {:?} from {}", other, client_id),
  }
}
