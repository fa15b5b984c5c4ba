//! Realtime change feed over the backend's Phoenix-channel websocket.
//!
//! # Protocol
//!
//! 1. Connect to `{base}/realtime/v1/websocket?apikey=...&vsn=1.0.0`
//! 2. Send `phx_join` on `realtime:{table}-changes` asking for all
//!    `postgres_changes` on the table
//! 3. Send `heartbeat` on the `phoenix` topic every 30 seconds
//! 4. Forward each `postgres_changes` message as a [`ChangeEvent`]
//! 5. On disconnect, wait 5 seconds, reconnect, and emit a resync event since
//!    changes may have been missed in between

use super::{ChangeEvent, ChangeKind, Subscription};
use crate::error::StoreError;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A Phoenix channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Build the websocket endpoint from the store's HTTP base URL.
pub fn websocket_url(base_url: &str, api_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        base,
        urlencoding::encode(api_key)
    )
}

/// Channel topic for a table's change feed.
pub fn channel_topic(table: &str) -> String {
    format!("realtime:{}-changes", table)
}

/// Join frame subscribing to every change on `schema.table`.
pub fn join_message(table: &str, schema: &str, access_token: Option<&str>, reference: u64) -> PhoenixMessage {
    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "*", "schema": schema, "table": table }
            ]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    PhoenixMessage {
        topic: channel_topic(table),
        event: "phx_join".to_string(),
        payload,
        reference: Some(reference.to_string()),
    }
}

fn heartbeat_message(reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Extract a change event from a `postgres_changes` frame.
///
/// Returns `None` for every other frame (replies, presence, system notices).
pub fn parse_change(table: &str, msg: &PhoenixMessage) -> Option<ChangeEvent> {
    if msg.event != "postgres_changes" {
        return None;
    }
    let data = msg.payload.get("data")?;
    let kind = ChangeKind::parse(data.get("type")?.as_str()?)?;
    if let Some(changed_table) = data.get("table").and_then(Value::as_str) {
        if changed_table != table {
            return None;
        }
    }

    let record = match kind {
        ChangeKind::Delete => data.get("old_record"),
        _ => data.get("record"),
    };
    let id = record
        .and_then(|r| r.get("id"))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    Some(ChangeEvent {
        table: table.to_string(),
        kind,
        id,
    })
}

/// Whether a frame is an error reply to our join.
fn is_join_error(table: &str, msg: &PhoenixMessage) -> bool {
    msg.event == "phx_reply"
        && msg.topic == channel_topic(table)
        && msg.payload.get("status").and_then(Value::as_str) == Some("error")
}

/// Opens one websocket per subscribed table.
#[derive(Debug, Clone)]
pub struct RealtimeListener {
    endpoint: String,
    schema: String,
    access_token: Option<String>,
    heartbeat: Duration,
    reconnect_delay: Duration,
}

impl RealtimeListener {
    pub fn new(base_url: &str, api_key: &str, schema: &str, access_token: Option<String>) -> Self {
        Self {
            endpoint: websocket_url(base_url, api_key),
            schema: schema.to_string(),
            access_token,
            heartbeat: HEARTBEAT_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start listening for changes on `table`.
    pub fn subscribe(&self, table: &str) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let (teardown_tx, teardown_rx) = oneshot::channel();
        let listener = self.clone();
        let table_name = table.to_string();
        tokio::spawn(async move { listener.run(table_name, tx, teardown_rx).await });
        Subscription::new(table, events, teardown_tx)
    }

    async fn run(
        self,
        table: String,
        tx: mpsc::UnboundedSender<ChangeEvent>,
        mut teardown: oneshot::Receiver<()>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                _ = &mut teardown => break,
                result = self.connect_and_listen(&table, &tx, attempt > 0) => match result {
                    Ok(()) => break,
                    Err(e) => warn!(
                        table = %table,
                        "Realtime connection error: {}. Reconnecting in {}s...",
                        e,
                        self.reconnect_delay.as_secs()
                    ),
                },
            }

            attempt += 1;
            tokio::select! {
                _ = &mut teardown => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
        info!(table = %table, "Realtime subscription closed");
    }

    /// Runs until the connection fails (`Err`) or the consumer goes away (`Ok`).
    async fn connect_and_listen(
        &self,
        table: &str,
        tx: &mpsc::UnboundedSender<ChangeEvent>,
        resync: bool,
    ) -> Result<(), StoreError> {
        debug!(table, endpoint = %self.endpoint, "Connecting to realtime endpoint");
        let (ws_stream, _response) = connect_async(&self.endpoint)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let mut next_ref: u64 = 1;
        let join = join_message(table, &self.schema, self.access_token.as_deref(), next_ref);
        next_ref += 1;
        send_frame(&mut write, &join).await?;
        info!(table, "Joined realtime channel");

        if resync {
            // Changes made while disconnected were never delivered.
            let event = ChangeEvent {
                table: table.to_string(),
                kind: ChangeKind::Update,
                id: None,
            };
            if tx.send(event).is_err() {
                return Ok(());
            }
        }

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    send_frame(&mut write, &heartbeat_message(next_ref)).await?;
                    next_ref += 1;
                }

                _ = tx.closed() => return Ok(()),

                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame: PhoenixMessage = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                debug!(table, "Ignoring undecodable realtime frame: {}", e);
                                continue;
                            }
                        };
                        if is_join_error(table, &frame) {
                            return Err(StoreError::rejected(format!(
                                "realtime join rejected: {}",
                                frame.payload
                            )));
                        }
                        if let Some(event) = parse_change(table, &frame) {
                            debug!(table, kind = ?event.kind, id = ?event.id, "Realtime change");
                            if tx.send(event).is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write
                            .send(Message::Pong(data))
                            .await
                            .map_err(|e| StoreError::Transport(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(StoreError::Transport("server closed connection".into()));
                    }
                    Some(Err(e)) => return Err(StoreError::Transport(e.to_string())),
                    _ => {}
                },
            }
        }
    }
}

async fn send_frame<S>(write: &mut S, frame: &PhoenixMessage) -> Result<(), StoreError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(frame).map_err(|e| StoreError::Decode(e.to_string()))?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("https://abc.example.co/", "key+1"),
            "wss://abc.example.co/realtime/v1/websocket?apikey=key%2B1&vsn=1.0.0"
        );
        assert_eq!(
            websocket_url("http://localhost:54321", "k"),
            "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );
    }

    #[test]
    fn test_join_message_shape() {
        let msg = join_message("projects", "public", Some("jwt"), 1);
        assert_eq!(msg.topic, "realtime:projects-changes");
        assert_eq!(msg.event, "phx_join");
        assert_eq!(msg.reference.as_deref(), Some("1"));
        let changes = &msg.payload["config"]["postgres_changes"][0];
        assert_eq!(changes["event"], "*");
        assert_eq!(changes["table"], "projects");
        assert_eq!(msg.payload["access_token"], "jwt");

        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire["ref"], "1");
    }

    #[test]
    fn test_parse_change_insert_and_delete() {
        let insert: PhoenixMessage = serde_json::from_value(json!({
            "topic": "realtime:tasks-changes",
            "event": "postgres_changes",
            "payload": { "data": {
                "type": "INSERT", "table": "tasks", "schema": "public",
                "record": { "id": "t-1", "title": "New" }
            }},
            "ref": null
        }))
        .unwrap();
        let event = parse_change("tasks", &insert).unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.id.as_deref(), Some("t-1"));

        let delete: PhoenixMessage = serde_json::from_value(json!({
            "topic": "realtime:tasks-changes",
            "event": "postgres_changes",
            "payload": { "data": {
                "type": "DELETE", "table": "tasks",
                "old_record": { "id": 42 }
            }}
        }))
        .unwrap();
        let event = parse_change("tasks", &delete).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_parse_change_ignores_other_frames() {
        let reply = PhoenixMessage {
            topic: "realtime:tasks-changes".into(),
            event: "phx_reply".into(),
            payload: json!({"status": "ok", "response": {}}),
            reference: Some("1".into()),
        };
        assert!(parse_change("tasks", &reply).is_none());
        assert!(!is_join_error("tasks", &reply));

        let failed = PhoenixMessage {
            payload: json!({"status": "error", "response": {"reason": "unauthorized"}}),
            ..reply
        };
        assert!(is_join_error("tasks", &failed));
    }
}
