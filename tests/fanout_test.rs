// Routing-key fanout and end-to-end delivery tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;

use rusty_rooks::broker::{Broker, MemoryBroker};
use rusty_rooks::constants::BROADCAST_KEY;
use rusty_rooks::core::clients::EventSink;
use rusty_rooks::core::event::Event;
use rusty_rooks::error::Result;
use rusty_rooks::game::spawn_delivery;

async fn recv_event(
    messages: &mut tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
) -> Option<Event> {
    match timeout(Duration::from_millis(100), messages.recv()).await {
        Ok(Some(raw)) => Some(serde_json::from_slice(&raw).unwrap()),
        _ => None,
    }
}

#[tokio::test]
async fn test_broadcast_key_reaches_every_player_queue() {
    let broker = MemoryBroker::new();
    broker.open_game("g1").await.unwrap();
    broker.open_player_queue("g1", "c1").await.unwrap();
    broker.open_player_queue("g1", "c2").await.unwrap();

    let mut sub1 = broker.subscribe("g1", "c1").await.unwrap();
    let mut sub2 = broker.subscribe("g1", "c2").await.unwrap();

    broker
        .publish("g1", BROADCAST_KEY, &Event::new("ping", serde_json::json!(1)))
        .await
        .unwrap();

    assert_eq!(recv_event(&mut sub1.messages).await.unwrap().name, "ping");
    assert_eq!(recv_event(&mut sub2.messages).await.unwrap().name, "ping");
}

#[tokio::test]
async fn test_connection_id_key_reaches_only_that_queue() {
    let broker = MemoryBroker::new();
    broker.open_game("g1").await.unwrap();
    broker.open_player_queue("g1", "c1").await.unwrap();
    broker.open_player_queue("g1", "c2").await.unwrap();

    let mut sub1 = broker.subscribe("g1", "c1").await.unwrap();
    let mut sub2 = broker.subscribe("g1", "c2").await.unwrap();

    broker
        .publish("g1", "c1", &Event::new("secret", serde_json::json!(1)))
        .await
        .unwrap();

    assert_eq!(recv_event(&mut sub1.messages).await.unwrap().name, "secret");
    assert!(
        recv_event(&mut sub2.messages).await.is_none(),
        "direct event must not leak to the other player"
    );
}

#[tokio::test]
async fn test_events_stop_after_unbind() {
    let broker = MemoryBroker::new();
    broker.open_game("g1").await.unwrap();
    broker.open_player_queue("g1", "c1").await.unwrap();
    let mut sub = broker.subscribe("g1", "c1").await.unwrap();

    broker.unbind_player_queue("g1", "c1").await.unwrap();
    broker
        .publish("g1", BROADCAST_KEY, &Event::new("late", serde_json::json!(1)))
        .await
        .unwrap();

    assert!(recv_event(&mut sub.messages).await.is_none());
}

/// Sink recording delivered event names per connection
struct RecordingSink {
    delivered: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, connection_id: &str, event: &Event) -> Result<()> {
        self.delivered
            .lock()
            .await
            .push((connection_id.to_string(), event.name.clone()));
        Ok(())
    }
}

#[tokio::test]
async fn test_published_event_flows_to_both_connection_sinks() {
    let broker = MemoryBroker::new();
    broker.open_game("g1").await.unwrap();
    broker.open_player_queue("g1", "c1").await.unwrap();
    broker.open_player_queue("g1", "c2").await.unwrap();

    let sink = Arc::new(RecordingSink::new());
    for connection_id in ["c1", "c2"] {
        let sub = broker.subscribe("g1", connection_id).await.unwrap();
        spawn_delivery(connection_id.to_string(), sub.messages, sink.clone());
    }

    broker
        .publish("g1", BROADCAST_KEY, &Event::new("tick", serde_json::json!(1)))
        .await
        .unwrap();
    broker
        .publish("g1", "c2", &Event::new("whisper", serde_json::json!(1)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let delivered = sink.delivered.lock().await;
    let count = |cid: &str, name: &str| {
        delivered
            .iter()
            .filter(|(c, n)| c == cid && n == name)
            .count()
    };
    assert_eq!(count("c1", "tick"), 1);
    assert_eq!(count("c2", "tick"), 1);
    assert_eq!(count("c1", "whisper"), 0);
    assert_eq!(count("c2", "whisper"), 1);
}
