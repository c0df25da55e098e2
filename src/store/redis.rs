//! Redis-backed session store
//!
//! The multiplexed connection is cheap to clone and safe for concurrent
//! use, so each operation clones it rather than locking.

use async_trait::async_trait;
use log::error;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use crate::constants::GAME_KEY_PREFIX;
use crate::core::session::GameSession;
use crate::error::{Result, RustyRooksError};
use crate::store::SessionStore;

fn store_err(context: &str, err: redis::RedisError) -> RustyRooksError {
    // Connection URLs can carry credentials; log only the operation
    error!("Redis {} failed: {}", context, err);
    RustyRooksError::StoreUnavailable(format!("{}: {}", context, err))
}

fn game_key(game_id: &str) -> String {
    format!("{}{}", GAME_KEY_PREFIX, game_id)
}

pub struct RedisSessionStore {
    connection: MultiplexedConnection,
}

impl RedisSessionStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| RustyRooksError::ConfigError(format!("invalid redis url: {}", e)))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| store_err("connect", e))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, game_id: &str) -> Result<GameSession> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn
            .get(game_key(game_id))
            .await
            .map_err(|e| store_err("get", e))?;

        let raw = raw.ok_or(RustyRooksError::SessionNotFound)?;
        serde_json::from_str(&raw).map_err(|e| {
            RustyRooksError::StoreUnavailable(format!("corrupt session record: {}", e))
        })
    }

    async fn save(&self, game_id: &str, session: &GameSession) -> Result<()> {
        let payload = serde_json::to_string(session).map_err(|e| {
            RustyRooksError::StoreUnavailable(format!("serialize session: {}", e))
        })?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .set(game_key(game_id), payload)
            .await
            .map_err(|e| store_err("set", e))?;
        Ok(())
    }

    async fn delete(&self, game_id: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(game_key(game_id))
            .await
            .map_err(|e| store_err("del", e))?;
        Ok(())
    }

    async fn count_active(&self) -> Result<usize> {
        let mut conn = self.connection.clone();
        let mut iter: redis::AsyncIter<'_, String> = conn
            .scan_match(format!("{}*", GAME_KEY_PREFIX))
            .await
            .map_err(|e| store_err("scan", e))?;

        let mut count = 0;
        while let Some(_key) = iter.next_item().await {
            count += 1;
        }
        Ok(count)
    }

    async fn clear_all(&self) -> Result<()> {
        let keys = {
            let mut conn = self.connection.clone();
            let mut iter: redis::AsyncIter<'_, String> = conn
                .scan_match(format!("{}*", GAME_KEY_PREFIX))
                .await
                .map_err(|e| store_err("scan", e))?;

            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if !keys.is_empty() {
            let mut conn = self.connection.clone();
            let _: () = conn.del(keys).await.map_err(|e| store_err("del", e))?;
        }
        Ok(())
    }
}
