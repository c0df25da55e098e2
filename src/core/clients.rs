//! Live websocket connections owned by this worker
//!
//! Each connection is pinned to the worker that accepted it; this map is the
//! only path from an event to the actual socket. Delivery targets are
//! abstracted behind `EventSink` so the fanout machinery can be exercised
//! without a network.

use std::collections::HashMap;

use async_trait::async_trait;
use log::warn;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use warp::ws::Message as WsMessage;

use crate::core::event::Event;
use crate::error::{Result, RustyRooksError};

/// Destination for events addressed to a single connection
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, connection_id: &str, event: &Event) -> Result<()>;
}

/// Maps connection ids to the sender half of each websocket's outbound
/// channel (the receiving half is drained by a forwarder task per socket).
pub struct ClientManager {
    senders: RwLock<HashMap<String, mpsc::UnboundedSender<WsMessage>>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, connection_id: &str, sender: mpsc::UnboundedSender<WsMessage>) {
        self.senders
            .write()
            .await
            .insert(connection_id.to_string(), sender);
    }

    pub async fn unregister(&self, connection_id: &str) {
        self.senders.write().await.remove(connection_id);
    }

    pub async fn client_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for ClientManager {
    async fn deliver(&self, connection_id: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event).map_err(|e| {
            RustyRooksError::ConnectionClosed(format!(
                "failed to serialize event {}: {}",
                event.name, e
            ))
        })?;

        let senders = self.senders.read().await;
        let sender = senders.get(connection_id).ok_or_else(|| {
            RustyRooksError::ConnectionClosed(connection_id.to_string())
        })?;

        sender.send(WsMessage::text(payload)).map_err(|_| {
            warn!("Send failed for connection {}", connection_id);
            RustyRooksError::ConnectionClosed(connection_id.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_to_registered_connection() {
        let clients = ClientManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        clients.register("c1", tx).await;

        clients
            .deliver("c1", &Event::game_id("g1"))
            .await
            .expect("delivery should succeed");

        let message = rx.recv().await.unwrap();
        let text = message.to_str().unwrap();
        assert!(text.contains("gameId"));
        assert!(text.contains("g1"));
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_connection_fails() {
        let clients = ClientManager::new();
        let result = clients.deliver("ghost", &Event::rematch_offer()).await;
        assert!(matches!(result, Err(RustyRooksError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_unregister_closes_the_route() {
        let clients = ClientManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        clients.register("c1", tx).await;
        clients.unregister("c1").await;
        assert_eq!(clients.client_count().await, 0);
        assert!(clients.deliver("c1", &Event::rematch_offer()).await.is_err());
    }
}
