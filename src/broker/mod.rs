//! Message broker gateway
//!
//! Connections are pinned to the worker that accepted them, so a player's
//! queue must be consumed by that specific worker; publishing through a
//! shared exchange with routing keys is what lets any worker reach a player
//! connected elsewhere. Topology is one topic exchange per game, one queue
//! per (game, connection) bound with the connection id and the broadcast
//! key.

pub mod amqp;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::event::Event;
use crate::error::Result;

// Re-export the backends
pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;

/// Identifies one running consumer so it can be cancelled at teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerHandle {
    pub game_id: String,
    pub connection_id: String,
    pub tag: String,
}

/// A started consumer: the handle for cancellation plus the channel the
/// delivery task reads raw messages from.
pub struct Subscription {
    pub handle: ConsumerHandle,
    pub messages: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Queue unique to one (game, connection) pair
pub fn queue_name(game_id: &str, connection_id: &str) -> String {
    format!("{}:{}", game_id, connection_id)
}

/// Gateway to the publish/subscribe broker.
///
/// Teardown operations (`cancel`, `unbind_player_queue`, `close_game`) are
/// idempotent: a resource already gone is success, since disconnect races
/// can trigger duplicate teardown.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare the game's topic exchange
    async fn open_game(&self, game_id: &str) -> Result<()>;

    /// Declare the player's queue and bind it to the game exchange under
    /// both the connection id and the broadcast key.
    async fn open_player_queue(&self, game_id: &str, connection_id: &str) -> Result<()>;

    /// Publish an event to the game exchange under a routing key: a
    /// connection id for a private event, the broadcast key for a shared
    /// one.
    async fn publish(&self, game_id: &str, routing_key: &str, event: &Event) -> Result<()>;

    /// Start consuming the player's queue
    async fn subscribe(&self, game_id: &str, connection_id: &str) -> Result<Subscription>;

    /// Stop a consumer
    async fn cancel(&self, handle: &ConsumerHandle) -> Result<()>;

    /// Unbind and drop the player's queue
    async fn unbind_player_queue(&self, game_id: &str, connection_id: &str) -> Result<()>;

    /// Delete the game exchange
    async fn close_game(&self, game_id: &str) -> Result<()>;
}
