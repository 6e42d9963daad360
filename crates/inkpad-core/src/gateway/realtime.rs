//! Supabase Realtime change feed over the Phoenix channel protocol.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::{ChangeEvent, ChangeKind, Collection, GatewayError, GatewayResult, Subscription};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_REF: &str = "1";

/// One Phoenix protocol frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PhoenixFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl PhoenixFrame {
    fn new(topic: impl Into<String>, event: &str, payload: Value, reference: u64) -> Self {
        Self {
            topic: topic.into(),
            event: event.to_string(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: Some(JOIN_REF.to_string()),
        }
    }

    fn into_message(self) -> GatewayResult<Message> {
        Ok(Message::text(serde_json::to_string(&self)?))
    }
}

fn topic_for(collection: Collection) -> String {
    format!("realtime:{}", collection.channel_name())
}

fn join_payload(table: &str, access_token: &str) -> Value {
    json!({
        "config": {
            "broadcast": { "ack": false, "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "*", "schema": "public", "table": table }
            ],
            "private": false
        },
        "access_token": access_token
    })
}

/// Extract a row change from a `postgres_changes` frame.
fn parse_change(frame: &PhoenixFrame, collection: Collection) -> Option<ChangeEvent> {
    if frame.event != "postgres_changes" {
        return None;
    }
    let data = frame.payload.get("data")?;
    let kind: ChangeKind = serde_json::from_value(data.get("type")?.clone()).ok()?;
    let row = |key: &str| {
        data.get(key)
            .filter(|value| value.as_object().is_some_and(|row| !row.is_empty()))
            .cloned()
    };
    Some(ChangeEvent {
        collection,
        kind,
        record: row("record"),
        old_record: row("old_record"),
    })
}

/// Open a change feed for `table`, delivering events into `events` until the
/// returned subscription is released.
pub(super) fn subscribe(
    endpoint: &str,
    access_token: String,
    collection: Collection,
    table: String,
    events: mpsc::UnboundedSender<ChangeEvent>,
) -> GatewayResult<Subscription> {
    let endpoint = Url::parse(endpoint)
        .map_err(|error| GatewayError::Realtime(format!("invalid realtime URL: {error}")))?;
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        if let Err(error) = run_channel(
            endpoint,
            &access_token,
            collection,
            &table,
            events,
            stop_rx,
        )
        .await
        {
            tracing::error!("Realtime feed for {} stopped: {}", collection, error);
        }
    });
    Ok(Subscription::new(collection, stop_tx, task))
}

async fn run_channel(
    endpoint: Url,
    access_token: &str,
    collection: Collection,
    table: &str,
    events: mpsc::UnboundedSender<ChangeEvent>,
    mut stop: oneshot::Receiver<()>,
) -> GatewayResult<()> {
    let (stream, _) = timeout(CONNECT_TIMEOUT, connect_async(endpoint.as_str()))
        .await
        .map_err(|_| GatewayError::Realtime("connection timed out".to_string()))?
        .map_err(|error| GatewayError::Realtime(format!("connection failed: {error}")))?;
    let (mut write, mut read) = stream.split();

    let topic = topic_for(collection);
    let mut next_ref: u64 = 1;
    let join = PhoenixFrame::new(&topic, "phx_join", join_payload(table, access_token), next_ref);
    write
        .send(join.into_message()?)
        .await
        .map_err(|error| GatewayError::Realtime(error.to_string()))?;
    tracing::debug!("Joined {}", topic);

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop => {
                next_ref += 1;
                let leave = PhoenixFrame::new(&topic, "phx_leave", json!({}), next_ref);
                let _ = write.send(leave.into_message()?).await;
                let _ = write.close().await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                next_ref += 1;
                let mut beat = PhoenixFrame::new("phoenix", "heartbeat", json!({}), next_ref);
                beat.join_ref = None;
                write
                    .send(beat.into_message()?)
                    .await
                    .map_err(|error| GatewayError::Realtime(error.to_string()))?;
            }
            message = read.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(error)) => return Err(GatewayError::Realtime(error.to_string())),
                    None => return Err(GatewayError::Realtime("connection closed".to_string())),
                };
                let Message::Text(text) = message else {
                    continue;
                };
                let frame: PhoenixFrame = match serde_json::from_str(text.as_str()) {
                    Ok(frame) => frame,
                    Err(error) => {
                        tracing::warn!("Ignoring malformed realtime frame: {}", error);
                        continue;
                    }
                };
                if frame.topic != topic {
                    continue;
                }
                match frame.event.as_str() {
                    "phx_reply" => {
                        let status = frame.payload.get("status").and_then(Value::as_str);
                        if status != Some("ok") {
                            tracing::warn!("Realtime join for {} rejected: {}", topic, frame.payload);
                        }
                    }
                    "phx_error" | "phx_close" => {
                        return Err(GatewayError::Realtime(format!("channel {}", frame.event)));
                    }
                    _ => {
                        if let Some(event) = parse_change(&frame, collection) {
                            if events.send(event).is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(payload: Value) -> PhoenixFrame {
        PhoenixFrame {
            topic: topic_for(Collection::Notes),
            event: "postgres_changes".to_string(),
            payload,
            reference: None,
            join_ref: None,
        }
    }

    #[test]
    fn parses_insert_change() {
        let frame = frame(json!({
            "ids": [1],
            "data": {
                "type": "INSERT",
                "schema": "public",
                "table": "notes",
                "record": { "id": "n1", "user_id": "u1" },
                "old_record": null
            }
        }));
        let event = parse_change(&frame, Collection::Notes).unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.owner(), Some("u1"));
        assert_eq!(event.old_record, None);
    }

    #[test]
    fn delete_change_keeps_old_record() {
        let frame = frame(json!({
            "data": {
                "type": "DELETE",
                "record": {},
                "old_record": { "id": "n1", "user_id": "u1" }
            }
        }));
        let event = parse_change(&frame, Collection::Notes).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.record, None);
        assert_eq!(event.row_id(), Some("n1"));
    }

    #[test]
    fn ignores_other_events() {
        let mut reply = frame(json!({ "status": "ok" }));
        reply.event = "phx_reply".to_string();
        assert_eq!(parse_change(&reply, Collection::Notes), None);
    }

    #[test]
    fn join_frame_shape() {
        let join = PhoenixFrame::new(
            topic_for(Collection::Groups),
            "phx_join",
            join_payload("groups", "token"),
            1,
        );
        let value = serde_json::to_value(&join).unwrap();
        assert_eq!(value["topic"], "realtime:groups_changes");
        assert_eq!(value["ref"], "1");
        assert_eq!(
            value["payload"]["config"]["postgres_changes"][0]["table"],
            "groups"
        );
    }

    #[tokio::test]
    async fn rejects_invalid_endpoint() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = subscribe("not a url", "t".to_string(), Collection::Notes, "notes".to_string(), tx);
        assert!(matches!(result, Err(GatewayError::Realtime(_))));
    }
}
