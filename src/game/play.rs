//! In-game actions
//!
//! Moves, draws, resignations and flag falls. Legality and terminal
//! detection are delegated to the rules engine; this layer owns the clocks
//! and the event fanout.

use std::sync::Arc;

use log::info;

use crate::broker::Broker;
use crate::constants::TURN_NOT_STARTED;
use crate::core::event::Event;
use crate::core::session::Colour;
use crate::error::{RustyRooksError, ScopedError};
use crate::game::lifecycle::GameController;
use crate::game::now_ms;
use crate::game::rules::{GameOutcome, RulesEngine};

pub struct PlayController {
    games: Arc<GameController>,
    broker: Arc<dyn Broker>,
    rules: Arc<dyn RulesEngine>,
}

impl PlayController {
    pub fn new(
        games: Arc<GameController>,
        broker: Arc<dyn Broker>,
        rules: Arc<dyn RulesEngine>,
    ) -> Self {
        Self {
            games,
            broker,
            rules,
        }
    }

    /// Apply a move for the connection, charge the elapsed turn time to its
    /// clock, and fan the result out to both players.
    pub async fn make_move(&self, connection_id: &str, uci: &str) -> Result<(), ScopedError> {
        let (game_id, mut session) = self.games.load_by_connection(connection_id).await?;

        let colour = session
            .seat_of(connection_id)
            .ok_or_else(|| ScopedError::local(RustyRooksError::NotInGame, connection_id))?;

        if session.turn_started_at == TURN_NOT_STARTED {
            return Err(ScopedError::local(
                RustyRooksError::IllegalMove("game has not started".to_string()),
                connection_id,
            ));
        }

        let to_move = self
            .rules
            .turn(&session.fen)
            .map_err(|e| ScopedError::local(e, connection_id))?;
        if to_move != colour {
            return Err(ScopedError::local(
                RustyRooksError::IllegalMove("not your turn".to_string()),
                connection_id,
            ));
        }

        session.fen = self
            .rules
            .apply_move(&session.fen, uci)
            .map_err(|e| ScopedError::local(e, connection_id))?;

        // Charge the thinking time to the mover and flip the turn clock
        let now = now_ms();
        let elapsed = now.saturating_sub(session.turn_started_at).max(0) as u64;
        let remaining = session.clock_for(colour).saturating_sub(elapsed);
        session.set_clock(colour, remaining);
        session.turn_started_at = now;

        self.games.save(&game_id, &session, connection_id).await?;

        self.games
            .broadcast(
                &game_id,
                &Event::moved(uci, &session.fen, remaining),
                connection_id,
            )
            .await?;

        let outcome = self
            .rules
            .outcome(&session.fen)
            .map_err(|e| ScopedError::local(e, connection_id))?;
        if let Some(outcome) = outcome {
            self.finish(&game_id, outcome, connection_id).await?;
        }
        Ok(())
    }

    pub async fn offer_draw(&self, connection_id: &str) -> Result<(), ScopedError> {
        let (game_id, session) = self.games.load_by_connection(connection_id).await?;
        if let Some(opponent) = session.opponent_of(connection_id) {
            self.broker
                .publish(&game_id, opponent, &Event::draw_offer())
                .await
                .map_err(|e| ScopedError::local(e, connection_id))?;
        }
        Ok(())
    }

    pub async fn accept_draw(&self, connection_id: &str) -> Result<(), ScopedError> {
        let (game_id, _session) = self.games.load_by_connection(connection_id).await?;
        self.games
            .broadcast(&game_id, &Event::end(None, "agreement"), connection_id)
            .await?;
        info!("Game {} drawn by agreement", game_id);
        Ok(())
    }

    pub async fn resign(&self, connection_id: &str) -> Result<(), ScopedError> {
        let (game_id, session) = self.games.load_by_connection(connection_id).await?;
        let colour = session
            .seat_of(connection_id)
            .ok_or_else(|| ScopedError::local(RustyRooksError::NotInGame, connection_id))?;
        self.games
            .broadcast(
                &game_id,
                &Event::end(Some(colour.other()), "resignation"),
                connection_id,
            )
            .await?;
        info!("{} resigned game {}", colour.as_str(), game_id);
        Ok(())
    }

    /// A player's clock ran out. The flagged colour is reported by the
    /// client that observed the flag, since clocks tick client-side between
    /// moves.
    pub async fn flag(&self, connection_id: &str, flagged: Colour) -> Result<(), ScopedError> {
        let (game_id, mut session) = self.games.load_by_connection(connection_id).await?;

        session.set_clock(flagged, 0);
        self.games.save(&game_id, &session, connection_id).await?;

        self.games
            .broadcast(
                &game_id,
                &Event::end(Some(flagged.other()), "timeout"),
                connection_id,
            )
            .await?;
        info!("{} flagged in game {}", flagged.as_str(), game_id);
        Ok(())
    }

    async fn finish(
        &self,
        game_id: &str,
        outcome: GameOutcome,
        connection_id: &str,
    ) -> Result<(), ScopedError> {
        self.games
            .broadcast(
                game_id,
                &Event::end(outcome.winner(), outcome.reason()),
                connection_id,
            )
            .await?;
        info!("Game {} ended: {}", game_id, outcome.reason());
        Ok(())
    }
}
