//! Session state persistence
//!
//! The authoritative copy of every live game lives in a shared cache so any
//! worker can serve any action. The store does no locking: a session's
//! load-mutate-save cycle is not atomic, and callers own serializing
//! concurrent mutations to one session.

pub mod memory;
pub mod redis;

use async_trait::async_trait;

use crate::core::session::GameSession;
use crate::error::Result;

// Re-export the backends
pub use self::redis::RedisSessionStore;
pub use memory::MemorySessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session. `SessionNotFound` if absent, `StoreUnavailable` on
    /// transport failure.
    async fn get(&self, game_id: &str) -> Result<GameSession>;

    /// Serialize and write, overwriting any prior value
    async fn save(&self, game_id: &str, session: &GameSession) -> Result<()>;

    /// Remove the session. Idempotent: absence is not an error.
    async fn delete(&self, game_id: &str) -> Result<()>;

    /// Number of live sessions, implemented as a scan over the key
    /// namespace; cost grows with the active-session count.
    async fn count_active(&self) -> Result<usize>;

    /// Drop every session, used at worker shutdown
    async fn clear_all(&self) -> Result<()>;
}
