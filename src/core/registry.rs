//! Per-worker connection bookkeeping
//!
//! Tracks which game each live connection on this worker belongs to, and
//! which broker consumers this worker owns for each game. Purely in-memory
//! and never shared between workers: after a restart the registrations are
//! rebuilt by fresh join actions, not recovered.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::broker::ConsumerHandle;

/// In-memory registry, shared between this worker's connection handlers
/// behind an `Arc`. Constructed explicitly and injected so independent
/// instances can coexist in tests.
pub struct GameRegistry {
    /// connection id -> game id
    player_games: RwLock<HashMap<String, String>>,
    /// game id -> consumer handles owned by this worker
    game_consumers: RwLock<HashMap<String, Vec<ConsumerHandle>>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            player_games: RwLock::new(HashMap::new()),
            game_consumers: RwLock::new(HashMap::new()),
        }
    }

    /// Record that a connection belongs to a game, overwriting any prior
    /// mapping for that connection.
    pub async fn record_player(&self, connection_id: &str, game_id: &str) {
        self.player_games
            .write()
            .await
            .insert(connection_id.to_string(), game_id.to_string());
    }

    /// Game the connection is in. Absence is a valid state, not an error.
    pub async fn game_of(&self, connection_id: &str) -> Option<String> {
        self.player_games.read().await.get(connection_id).cloned()
    }

    pub async fn remove_player(&self, connection_id: &str) {
        self.player_games.write().await.remove(connection_id);
    }

    pub async fn add_consumer(&self, game_id: &str, handle: ConsumerHandle) {
        self.game_consumers
            .write()
            .await
            .entry(game_id.to_string())
            .or_default()
            .push(handle);
    }

    pub async fn consumers_of(&self, game_id: &str) -> Vec<ConsumerHandle> {
        self.game_consumers
            .read()
            .await
            .get(game_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove and return every consumer handle for a game (teardown)
    pub async fn take_consumers(&self, game_id: &str) -> Vec<ConsumerHandle> {
        self.game_consumers
            .write()
            .await
            .remove(game_id)
            .unwrap_or_default()
    }

    /// Drop all bookkeeping, used at worker shutdown
    pub async fn clear(&self) {
        self.player_games.write().await.clear();
        self.game_consumers.write().await.clear();
    }

    pub async fn player_count(&self) -> usize {
        self.player_games.read().await.len()
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(game_id: &str, connection_id: &str, tag: &str) -> ConsumerHandle {
        ConsumerHandle {
            game_id: game_id.to_string(),
            connection_id: connection_id.to_string(),
            tag: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_player_overwrites_prior_mapping() {
        let registry = GameRegistry::new();
        registry.record_player("c1", "g1").await;
        registry.record_player("c1", "g2").await;
        assert_eq!(registry.game_of("c1").await, Some("g2".to_string()));
    }

    #[tokio::test]
    async fn test_game_of_absent_connection_is_none() {
        let registry = GameRegistry::new();
        assert_eq!(registry.game_of("missing").await, None);
    }

    #[tokio::test]
    async fn test_remove_player_forgets_mapping() {
        let registry = GameRegistry::new();
        registry.record_player("c1", "g1").await;
        registry.remove_player("c1").await;
        assert_eq!(registry.game_of("c1").await, None);
        // Removing twice is harmless
        registry.remove_player("c1").await;
    }

    #[tokio::test]
    async fn test_consumers_append_and_drain() {
        let registry = GameRegistry::new();
        registry.add_consumer("g1", handle("g1", "c1", "t1")).await;
        registry.add_consumer("g1", handle("g1", "c2", "t2")).await;

        let handles = registry.consumers_of("g1").await;
        assert_eq!(handles.len(), 2);

        let taken = registry.take_consumers("g1").await;
        assert_eq!(taken.len(), 2);
        assert!(registry.consumers_of("g1").await.is_empty());
        assert!(registry.take_consumers("g1").await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_empties_everything() {
        let registry = GameRegistry::new();
        registry.record_player("c1", "g1").await;
        registry.add_consumer("g1", handle("g1", "c1", "t1")).await;
        registry.clear().await;
        assert_eq!(registry.player_count().await, 0);
        assert!(registry.consumers_of("g1").await.is_empty());
    }
}
