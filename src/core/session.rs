//! Authoritative game session state
//!
//! A `GameSession` is the record shared between workers through the session
//! store. Everything a worker needs to resume serving a game after another
//! worker mutated it lives here.

use serde::{Deserialize, Serialize};

use crate::constants::{MILLISECONDS_PER_MINUTE, TURN_NOT_STARTED};

/// Side of the board. Seat order in `GameSession::players` decides colours:
/// index 0 plays white, index 1 plays black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    White,
    Black,
}

impl Colour {
    pub fn other(self) -> Colour {
        match self {
            Colour::White => Colour::Black,
            Colour::Black => Colour::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Colour::White => "white",
            Colour::Black => "black",
        }
    }
}

/// One game instance, serialized as JSON under `"game:" + id` in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    /// Seated connection ids, at most two. Order is randomized once both
    /// players are present and is meaningful from then on: [0] white, [1]
    /// black. It must not be re-shuffled afterward (rematch reverses it
    /// deliberately).
    pub players: Vec<String>,
    /// Board position, opaque to the session layer. Produced and consumed
    /// by the rules engine.
    pub fen: String,
    /// Remaining time for white, milliseconds
    pub clock_white: u64,
    /// Remaining time for black, milliseconds
    pub clock_black: u64,
    /// Epoch-ms timestamp of the current turn's start, or TURN_NOT_STARTED
    pub turn_started_at: i64,
    /// Base per-player budget in minutes; fixed for the session's lifetime
    pub time_control: u64,
}

impl GameSession {
    /// Fresh single-player session awaiting an opponent
    pub fn new(initiator: &str, time_control: u64, initial_fen: String) -> Self {
        let budget = time_control * MILLISECONDS_PER_MINUTE;
        Self {
            players: vec![initiator.to_string()],
            fen: initial_fen,
            clock_white: budget,
            clock_black: budget,
            turn_started_at: TURN_NOT_STARTED,
            time_control,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() > 1
    }

    /// Colour assigned to a seated connection, if any
    pub fn seat_of(&self, connection_id: &str) -> Option<Colour> {
        match self.players.iter().position(|p| p == connection_id) {
            Some(0) => Some(Colour::White),
            Some(1) => Some(Colour::Black),
            _ => None,
        }
    }

    /// Connection seated at the given colour
    pub fn player_at(&self, colour: Colour) -> Option<&str> {
        let index = match colour {
            Colour::White => 0,
            Colour::Black => 1,
        };
        self.players.get(index).map(String::as_str)
    }

    /// The opponent of a seated connection, once both players are present
    pub fn opponent_of(&self, connection_id: &str) -> Option<&str> {
        self.players
            .iter()
            .find(|p| p.as_str() != connection_id)
            .map(String::as_str)
    }

    pub fn clock_for(&self, colour: Colour) -> u64 {
        match colour {
            Colour::White => self.clock_white,
            Colour::Black => self.clock_black,
        }
    }

    pub fn set_clock(&mut self, colour: Colour, remaining: u64) {
        match colour {
            Colour::White => self.clock_white = remaining,
            Colour::Black => self.clock_black = remaining,
        }
    }

    /// Reset clocks and position for a rematch, swapping colours
    pub fn reset_for_rematch(&mut self, initial_fen: String, now_ms: i64) {
        let budget = self.time_control * MILLISECONDS_PER_MINUTE;
        self.fen = initial_fen;
        self.players.reverse();
        self.clock_white = budget;
        self.clock_black = budget;
        self.turn_started_at = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_sets_clocks_from_time_control() {
        let session = GameSession::new("conn-1", 5, "startpos".to_string());
        assert_eq!(session.players, vec!["conn-1".to_string()]);
        assert_eq!(session.clock_white, 300_000);
        assert_eq!(session.clock_black, 300_000);
        assert_eq!(session.turn_started_at, TURN_NOT_STARTED);
        assert!(!session.is_full());
    }

    #[test]
    fn test_seat_assignment_follows_player_order() {
        let mut session = GameSession::new("a", 3, "startpos".to_string());
        session.players.push("b".to_string());
        assert_eq!(session.seat_of("a"), Some(Colour::White));
        assert_eq!(session.seat_of("b"), Some(Colour::Black));
        assert_eq!(session.seat_of("c"), None);
        assert_eq!(session.player_at(Colour::Black), Some("b"));
        assert_eq!(session.opponent_of("a"), Some("b"));
    }

    #[test]
    fn test_rematch_reverses_players_and_resets_clocks() {
        let mut session = GameSession::new("a", 10, "startpos".to_string());
        session.players.push("b".to_string());
        session.clock_white = 1;
        session.clock_black = 2;

        session.reset_for_rematch("startpos".to_string(), 42);

        assert_eq!(session.players, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(session.clock_white, 600_000);
        assert_eq!(session.clock_black, 600_000);
        assert_eq!(session.turn_started_at, 42);
    }
}
