//! In-process broker for tests and single-worker development
//!
//! Implements the same exchange/queue/routing-key topology as the AMQP
//! backend over in-memory channels. Routing keys are matched literally,
//! which is all the game topology uses.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::broker::{queue_name, Broker, ConsumerHandle, Subscription};
use crate::constants::BROADCAST_KEY;
use crate::core::event::Event;
use crate::error::{Result, RustyRooksError};

struct QueueSlot {
    sender: mpsc::UnboundedSender<Vec<u8>>,
    /// Taken by the first subscriber
    receiver: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

struct Binding {
    queue: String,
    routing_keys: HashSet<String>,
}

#[derive(Default)]
struct BrokerState {
    /// exchange name -> bindings
    exchanges: HashMap<String, Vec<Binding>>,
    /// queue name -> slot
    queues: HashMap<String, QueueSlot>,
}

pub struct MemoryBroker {
    state: Mutex<BrokerState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn open_game(&self, game_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.exchanges.entry(game_id.to_string()).or_default();
        Ok(())
    }

    async fn open_player_queue(&self, game_id: &str, connection_id: &str) -> Result<()> {
        let queue = queue_name(game_id, connection_id);
        let mut state = self.state.lock().await;

        if !state.exchanges.contains_key(game_id) {
            return Err(RustyRooksError::BrokerError(format!(
                "no such exchange: {}",
                game_id
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.queues.insert(
            queue.clone(),
            QueueSlot {
                sender: tx,
                receiver: Some(rx),
            },
        );

        let bindings = state.exchanges.entry(game_id.to_string()).or_default();
        bindings.retain(|b| b.queue != queue);
        bindings.push(Binding {
            queue,
            routing_keys: [connection_id.to_string(), BROADCAST_KEY.to_string()]
                .into_iter()
                .collect(),
        });
        Ok(())
    }

    async fn publish(&self, game_id: &str, routing_key: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| RustyRooksError::BrokerError(format!("serialize event: {}", e)))?;

        let state = self.state.lock().await;
        let bindings = state.exchanges.get(game_id).ok_or_else(|| {
            RustyRooksError::BrokerError(format!("no such exchange: {}", game_id))
        })?;

        for binding in bindings {
            if binding.routing_keys.contains(routing_key) {
                if let Some(slot) = state.queues.get(&binding.queue) {
                    // A cancelled consumer just means nobody is listening
                    let _ = slot.sender.send(payload.clone());
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&self, game_id: &str, connection_id: &str) -> Result<Subscription> {
        let queue = queue_name(game_id, connection_id);
        let mut state = self.state.lock().await;

        let slot = state.queues.get_mut(&queue).ok_or_else(|| {
            RustyRooksError::BrokerError(format!("no such queue: {}", queue))
        })?;
        let receiver = slot.receiver.take().ok_or_else(|| {
            RustyRooksError::BrokerError(format!("queue already consumed: {}", queue))
        })?;

        Ok(Subscription {
            handle: ConsumerHandle {
                game_id: game_id.to_string(),
                connection_id: connection_id.to_string(),
                tag: format!("ctag-{}", Uuid::new_v4()),
            },
            messages: receiver,
        })
    }

    async fn cancel(&self, handle: &ConsumerHandle) -> Result<()> {
        let queue = queue_name(&handle.game_id, &handle.connection_id);
        let mut state = self.state.lock().await;
        // Dropping the sender ends the subscriber's receive loop. Already
        // gone is success.
        state.queues.remove(&queue);
        Ok(())
    }

    async fn unbind_player_queue(&self, game_id: &str, connection_id: &str) -> Result<()> {
        let queue = queue_name(game_id, connection_id);
        let mut state = self.state.lock().await;
        if let Some(bindings) = state.exchanges.get_mut(game_id) {
            bindings.retain(|b| b.queue != queue);
        }
        state.queues.remove(&queue);
        Ok(())
    }

    async fn close_game(&self, game_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(bindings) = state.exchanges.remove(game_id) {
            for binding in bindings {
                state.queues.remove(&binding.queue);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let broker = MemoryBroker::new();
        let handle = ConsumerHandle {
            game_id: "g1".to_string(),
            connection_id: "c1".to_string(),
            tag: "t".to_string(),
        };

        // Nothing exists yet; teardown must still succeed
        broker.cancel(&handle).await.unwrap();
        broker.unbind_player_queue("g1", "c1").await.unwrap();
        broker.close_game("g1").await.unwrap();

        // And again after real setup and teardown
        broker.open_game("g1").await.unwrap();
        broker.open_player_queue("g1", "c1").await.unwrap();
        broker.close_game("g1").await.unwrap();
        broker.close_game("g1").await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_to_unknown_exchange_fails() {
        let broker = MemoryBroker::new();
        let result = broker
            .publish("missing", BROADCAST_KEY, &Event::rematch_offer())
            .await;
        assert!(matches!(result, Err(RustyRooksError::BrokerError(_))));
    }

    #[tokio::test]
    async fn test_subscribe_requires_declared_queue() {
        let broker = MemoryBroker::new();
        broker.open_game("g1").await.unwrap();
        assert!(broker.subscribe("g1", "c1").await.is_err());

        broker.open_player_queue("g1", "c1").await.unwrap();
        assert!(broker.subscribe("g1", "c1").await.is_ok());
        // Second subscriber on the same queue is refused
        assert!(broker.subscribe("g1", "c1").await.is_err());
    }
}
