//! In-memory session store for development and testing

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::session::GameSession;
use crate::error::{Result, RustyRooksError};
use crate::store::SessionStore;

pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, GameSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, game_id: &str) -> Result<GameSession> {
        self.sessions
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or(RustyRooksError::SessionNotFound)
    }

    async fn save(&self, game_id: &str, session: &GameSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(game_id.to_string(), session.clone());
        Ok(())
    }

    async fn delete(&self, game_id: &str) -> Result<()> {
        self.sessions.write().await.remove(game_id);
        Ok(())
    }

    async fn count_active(&self) -> Result<usize> {
        Ok(self.sessions.read().await.len())
    }

    async fn clear_all(&self) -> Result<()> {
        self.sessions.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_get_delete_cycle() {
        let store = MemorySessionStore::new();
        let session = GameSession::new("c1", 5, "startpos".to_string());

        assert!(matches!(
            store.get("g1").await,
            Err(RustyRooksError::SessionNotFound)
        ));

        store.save("g1", &session).await.unwrap();
        let loaded = store.get("g1").await.unwrap();
        assert_eq!(loaded.players, session.players);
        assert_eq!(store.count_active().await.unwrap(), 1);

        store.delete("g1").await.unwrap();
        assert!(store.get("g1").await.is_err());
        // Deleting again is fine
        store.delete("g1").await.unwrap();
        assert_eq!(store.count_active().await.unwrap(), 0);
    }
}
