//! Game session lifecycle
//!
//! Create, join, rematch, and teardown. Every mutation goes through the
//! shared store so any worker can pick the game up, and every notification
//! goes through the broker so it reaches players pinned to other workers.
//! The one exception is the `gameId` reply to a creator: there is no second
//! player yet, so it goes straight down the creator's own connection.

use std::sync::Arc;

use log::{info, warn};
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::broker::Broker;
use crate::constants::BROADCAST_KEY;
use crate::core::clients::EventSink;
use crate::core::event::Event;
use crate::core::registry::GameRegistry;
use crate::core::session::{Colour, GameSession};
use crate::error::{RustyRooksError, ScopedError};
use crate::game::delivery::spawn_delivery;
use crate::game::now_ms;
use crate::game::rules::RulesEngine;
use crate::store::SessionStore;

pub struct GameController {
    store: Arc<dyn SessionStore>,
    broker: Arc<dyn Broker>,
    registry: Arc<GameRegistry>,
    clients: Arc<dyn EventSink>,
    rules: Arc<dyn RulesEngine>,
    concurrent_game_limit: usize,
}

impl GameController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        broker: Arc<dyn Broker>,
        registry: Arc<GameRegistry>,
        clients: Arc<dyn EventSink>,
        rules: Arc<dyn RulesEngine>,
        concurrent_game_limit: usize,
    ) -> Self {
        Self {
            store,
            broker,
            registry,
            clients,
            rules,
            concurrent_game_limit,
        }
    }

    /// Load the session a connection is playing in
    pub(crate) async fn load_by_connection(
        &self,
        connection_id: &str,
    ) -> Result<(String, GameSession), ScopedError> {
        let game_id = self
            .registry
            .game_of(connection_id)
            .await
            .ok_or_else(|| ScopedError::local(RustyRooksError::NotInGame, connection_id))?;
        let session = self
            .store
            .get(&game_id)
            .await
            .map_err(|e| ScopedError::local(e, connection_id))?;
        Ok((game_id, session))
    }

    pub(crate) async fn save(
        &self,
        game_id: &str,
        session: &GameSession,
        connection_id: &str,
    ) -> Result<(), ScopedError> {
        // A failed save leaves every player looking at stale state, so the
        // error is scoped to the whole session.
        self.store
            .save(game_id, session)
            .await
            .map_err(|e| ScopedError::session(e, connection_id, game_id))
    }

    /// Subscribe the player's queue and hand it to a delivery task
    async fn start_listener(
        &self,
        game_id: &str,
        connection_id: &str,
    ) -> Result<(), ScopedError> {
        info!(
            "Starting listener for game {}, connection {}",
            game_id, connection_id
        );
        let subscription = self
            .broker
            .subscribe(game_id, connection_id)
            .await
            .map_err(|e| ScopedError::local(e, connection_id))?;
        self.registry
            .add_consumer(game_id, subscription.handle)
            .await;
        spawn_delivery(
            connection_id.to_string(),
            subscription.messages,
            Arc::clone(&self.clients),
        );
        Ok(())
    }

    /// Route one `start` event to each seated player: the payload differs
    /// per recipient (own colour and clock), so these are never broadcast.
    async fn publish_start_events(
        &self,
        game_id: &str,
        session: &GameSession,
        connection_id: &str,
    ) -> Result<(), ScopedError> {
        for colour in [Colour::White, Colour::Black] {
            if let Some(player) = session.player_at(colour) {
                self.broker
                    .publish(
                        game_id,
                        player,
                        &Event::start(colour, session.clock_for(colour)),
                    )
                    .await
                    .map_err(|e| ScopedError::local(e, connection_id))?;
            }
        }
        Ok(())
    }

    /// Open a new game with the initiator as the only seated player.
    /// Returns the game id, which is also delivered to the initiator as a
    /// `gameId` event.
    pub async fn create(
        &self,
        connection_id: &str,
        time_control: u64,
    ) -> Result<String, ScopedError> {
        let active = self
            .store
            .count_active()
            .await
            .map_err(|e| ScopedError::local(e, connection_id))?;
        if active > self.concurrent_game_limit {
            return Err(ScopedError::local(
                RustyRooksError::CapacityExceeded,
                connection_id,
            ));
        }

        let game_id = Uuid::new_v4().to_string();
        let session = GameSession::new(connection_id, time_control, self.rules.initial_position());

        self.registry.record_player(connection_id, &game_id).await;
        self.save(&game_id, &session, connection_id).await?;

        // Direct reply; deliberately not routed through the broker
        if let Err(e) = self
            .clients
            .deliver(connection_id, &Event::game_id(&game_id))
            .await
        {
            warn!("Could not deliver gameId to {}: {}", connection_id, e);
        }

        self.broker
            .open_game(&game_id)
            .await
            .map_err(|e| ScopedError::local(e, connection_id))?;
        self.broker
            .open_player_queue(&game_id, connection_id)
            .await
            .map_err(|e| ScopedError::local(e, connection_id))?;
        self.start_listener(&game_id, connection_id).await?;

        info!("Game {} created by {}", game_id, connection_id);
        Ok(game_id)
    }

    /// Seat a second player, assign colours at random and start the clock
    pub async fn join(&self, connection_id: &str, game_id: &str) -> Result<(), ScopedError> {
        let mut session = self
            .store
            .get(game_id)
            .await
            .map_err(|e| ScopedError::local(e, connection_id))?;

        if session.is_full() {
            return Err(ScopedError::local(
                RustyRooksError::SessionFull,
                connection_id,
            ));
        }

        session.players.push(connection_id.to_string());
        self.registry.record_player(connection_id, game_id).await;

        // Fair colour assignment, fixed from here on
        session.players.shuffle(&mut rand::thread_rng());
        session.turn_started_at = now_ms();

        self.save(game_id, &session, connection_id).await?;

        self.broker
            .open_player_queue(game_id, connection_id)
            .await
            .map_err(|e| ScopedError::local(e, connection_id))?;
        self.start_listener(game_id, connection_id).await?;

        self.publish_start_events(game_id, &session, connection_id)
            .await?;

        info!("Connection {} joined game {}", connection_id, game_id);
        Ok(())
    }

    /// Offer the opponent a rematch
    pub async fn offer_rematch(&self, connection_id: &str) -> Result<(), ScopedError> {
        let (game_id, session) = self.load_by_connection(connection_id).await?;
        if let Some(opponent) = session.opponent_of(connection_id) {
            self.broker
                .publish(&game_id, opponent, &Event::rematch_offer())
                .await
                .map_err(|e| ScopedError::local(e, connection_id))?;
        }
        Ok(())
    }

    /// Start a fresh game in the same session: colours swap, clocks and
    /// position reset, the time control carries over.
    pub async fn accept_rematch(&self, connection_id: &str) -> Result<(), ScopedError> {
        // TODO: track pending offers on the session and reject an accept
        // that was never offered
        let (game_id, mut session) = self.load_by_connection(connection_id).await?;

        session.reset_for_rematch(self.rules.initial_position(), now_ms());
        self.save(&game_id, &session, connection_id).await?;

        self.publish_start_events(&game_id, &session, connection_id)
            .await?;

        info!("Rematch started in game {}", game_id);
        Ok(())
    }

    /// Remove a connection from its game; tears the session down entirely
    /// when it was the last player. Tolerates duplicate calls (explicit
    /// exit plus disconnect) and sessions that are already gone.
    pub async fn leave(&self, connection_id: &str) -> Result<(), ScopedError> {
        let game_id = match self.registry.game_of(connection_id).await {
            Some(game_id) => game_id,
            // Already cleaned up
            None => return Ok(()),
        };

        let session = match self.store.get(&game_id).await {
            Ok(session) => Some(session),
            // Torn down by a racing leave; just drop our bookkeeping
            Err(RustyRooksError::SessionNotFound) => None,
            Err(e) => return Err(ScopedError::local(e, connection_id)),
        };

        self.registry.remove_player(connection_id).await;
        if let Err(e) = self.broker.unbind_player_queue(&game_id, connection_id).await {
            warn!("Unbind for {} in game {} failed: {}", connection_id, game_id, e);
        }

        let Some(mut session) = session else {
            return Ok(());
        };

        if session.players.len() > 1 {
            session.players.retain(|p| p != connection_id);
            self.save(&game_id, &session, connection_id).await?;
            info!("Connection {} left game {}", connection_id, game_id);
        } else {
            // Last player out: drop consumers, the exchange and the record
            for handle in self.registry.take_consumers(&game_id).await {
                if let Err(e) = self.broker.cancel(&handle).await {
                    warn!("Cancel of consumer {} failed: {}", handle.tag, e);
                }
            }
            if let Err(e) = self.broker.close_game(&game_id).await {
                warn!("Closing exchange {} failed: {}", game_id, e);
            }
            self.store
                .delete(&game_id)
                .await
                .map_err(|e| ScopedError::local(e, connection_id))?;
            info!("Game {} closed", game_id);
        }
        Ok(())
    }

    /// Broadcast an event to every player in the game
    pub(crate) async fn broadcast(
        &self,
        game_id: &str,
        event: &Event,
        connection_id: &str,
    ) -> Result<(), ScopedError> {
        self.broker
            .publish(game_id, BROADCAST_KEY, event)
            .await
            .map_err(|e| ScopedError::local(e, connection_id))
    }
}
