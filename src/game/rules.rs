//! Chess rules collaborator
//!
//! The session layer treats positions as opaque strings; everything that
//! understands chess sits behind `RulesEngine`. The production engine wraps
//! shakmaty; positions travel as FEN.

use shakmaty::fen::Fen;
use shakmaty::uci::Uci;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};

use crate::core::session::Colour;
use crate::error::{Result, RustyRooksError};

/// Terminal result of a position, as far as the board alone can tell.
/// Resignation, timeout and agreement are decided by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Checkmate { winner: Colour },
    Stalemate,
    InsufficientMaterial,
}

impl GameOutcome {
    pub fn winner(self) -> Option<Colour> {
        match self {
            GameOutcome::Checkmate { winner } => Some(winner),
            _ => None,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            GameOutcome::Checkmate { .. } => "checkmate",
            GameOutcome::Stalemate => "stalemate",
            GameOutcome::InsufficientMaterial => "insufficient material",
        }
    }
}

pub trait RulesEngine: Send + Sync {
    /// Serialized starting position for a fresh game
    fn initial_position(&self) -> String;

    /// Which colour is to move
    fn turn(&self, fen: &str) -> Result<Colour>;

    /// Apply a UCI move, returning the new position. `IllegalMove` when the
    /// move does not exist in this position.
    fn apply_move(&self, fen: &str, uci: &str) -> Result<String>;

    /// Terminal outcome of the position, if any
    fn outcome(&self, fen: &str) -> Result<Option<GameOutcome>>;
}

pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShakmatyRules {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_position(raw: &str) -> Result<Chess> {
    let fen: Fen = raw
        .parse()
        .map_err(|e| RustyRooksError::StoreUnavailable(format!("corrupt position: {}", e)))?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|e| RustyRooksError::StoreUnavailable(format!("corrupt position: {}", e)))
}

fn fen_of(position: Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

fn colour_of(colour: shakmaty::Color) -> Colour {
    if colour.is_white() {
        Colour::White
    } else {
        Colour::Black
    }
}

impl RulesEngine for ShakmatyRules {
    fn initial_position(&self) -> String {
        fen_of(Chess::default())
    }

    fn turn(&self, fen: &str) -> Result<Colour> {
        let position = parse_position(fen)?;
        Ok(colour_of(position.turn()))
    }

    fn apply_move(&self, fen: &str, uci: &str) -> Result<String> {
        let position = parse_position(fen)?;
        let uci: Uci = uci
            .parse()
            .map_err(|e| RustyRooksError::IllegalMove(format!("{}", e)))?;
        let chess_move = uci
            .to_move(&position)
            .map_err(|e| RustyRooksError::IllegalMove(format!("{}", e)))?;
        let next = position
            .play(&chess_move)
            .map_err(|e| RustyRooksError::IllegalMove(format!("{}", e)))?;
        Ok(fen_of(next))
    }

    fn outcome(&self, fen: &str) -> Result<Option<GameOutcome>> {
        let position = parse_position(fen)?;
        if position.is_checkmate() {
            // The side to move is the one mated
            return Ok(Some(GameOutcome::Checkmate {
                winner: colour_of(position.turn()).other(),
            }));
        }
        if position.is_stalemate() {
            return Ok(Some(GameOutcome::Stalemate));
        }
        if position.is_insufficient_material() {
            return Ok(Some(GameOutcome::InsufficientMaterial));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_position_is_standard_start() {
        let rules = ShakmatyRules::new();
        assert_eq!(
            rules.initial_position(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
        assert_eq!(rules.turn(&rules.initial_position()).unwrap(), Colour::White);
    }

    #[test]
    fn test_legal_move_advances_position_and_turn() {
        let rules = ShakmatyRules::new();
        let after = rules.apply_move(&rules.initial_position(), "e2e4").unwrap();
        assert!(after.starts_with("rnbqkbnr/pppppppp/8/8/4P3/"));
        assert_eq!(rules.turn(&after).unwrap(), Colour::Black);
        assert_eq!(rules.outcome(&after).unwrap(), None);
    }

    #[test]
    fn test_illegal_move_is_rejected() {
        let rules = ShakmatyRules::new();
        let start = rules.initial_position();
        assert!(matches!(
            rules.apply_move(&start, "e2e5"),
            Err(RustyRooksError::IllegalMove(_))
        ));
        assert!(matches!(
            rules.apply_move(&start, "not-a-move"),
            Err(RustyRooksError::IllegalMove(_))
        ));
    }

    #[test]
    fn test_fools_mate_is_checkmate_for_black() {
        let rules = ShakmatyRules::new();
        let mut fen = rules.initial_position();
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            fen = rules.apply_move(&fen, uci).unwrap();
        }
        assert_eq!(
            rules.outcome(&fen).unwrap(),
            Some(GameOutcome::Checkmate {
                winner: Colour::Black
            })
        );
    }

    #[test]
    fn test_stalemate_is_detected() {
        let rules = ShakmatyRules::new();
        let outcome = rules.outcome("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(outcome, Some(GameOutcome::Stalemate));
    }
}
