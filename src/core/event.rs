//! Wire protocol: events going out to clients and commands coming in
//!
//! An `Event` is both the unit of broker transport (serialized into the
//! game exchange) and the unit of delivery down a websocket.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::session::Colour;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: Value,
}

impl Event {
    pub fn new(name: &str, data: Value) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }

    /// Sent to the creator only, directly on their connection. Never routed
    /// through the broker: there is no second player yet.
    pub fn game_id(game_id: &str) -> Self {
        Self::new("gameId", json!(game_id))
    }

    /// Sent on registration so the client learns its connection id
    pub fn connected(connection_id: &str) -> Self {
        Self::new("connected", json!({ "id": connection_id }))
    }

    /// Per-player game start: payload differs per recipient, so this is
    /// routed to each player's own connection id rather than broadcast.
    pub fn start(colour: Colour, time_remaining: u64) -> Self {
        Self::new(
            "start",
            json!({ "colour": colour.as_str(), "timeRemaining": time_remaining }),
        )
    }

    pub fn rematch_offer() -> Self {
        Self::new("rematchOffer", json!(1))
    }

    pub fn draw_offer() -> Self {
        Self::new("drawOffer", json!(1))
    }

    /// Broadcast after a legal move
    pub fn moved(uci: &str, fen: &str, time_remaining: u64) -> Self {
        Self::new(
            "move",
            json!({ "uci": uci, "fen": fen, "timeRemaining": time_remaining }),
        )
    }

    /// Broadcast when a game reaches a terminal outcome. `winner` is None
    /// for draws.
    pub fn end(winner: Option<Colour>, reason: &str) -> Self {
        Self::new(
            "end",
            json!({ "winner": winner.map(Colour::as_str), "reason": reason }),
        )
    }

    pub fn error(message: &str) -> Self {
        Self::new("error", json!(message))
    }
}

/// Commands a client may send over its websocket, tagged JSON
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    Create { time_control: u64 },
    #[serde(rename_all = "camelCase")]
    Join { game_id: String },
    Move {
        uci: String,
    },
    OfferDraw,
    AcceptDraw,
    Resign,
    Flag {
        flagged: Colour,
    },
    OfferRematch,
    AcceptRematch,
    Exit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_round_trips_through_json() {
        let event = Event::start(Colour::White, 300_000);
        let bytes = serde_json::to_vec(&event).unwrap();
        let parsed: Event = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.name, "start");
        assert_eq!(parsed.data["colour"], "white");
        assert_eq!(parsed.data["timeRemaining"], 300_000);
    }

    #[test]
    fn test_client_command_parses_tagged_json() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"create","timeControl":5}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Create { time_control: 5 }));

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"join","gameId":"abc"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Join { game_id } if game_id == "abc"));

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"flag","flagged":"black"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Flag { flagged: Colour::Black }));

        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"offerRematch"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::OfferRematch));
    }

    #[test]
    fn test_end_event_draw_has_null_winner() {
        let event = Event::end(None, "agreement");
        assert!(event.data["winner"].is_null());
        assert_eq!(event.data["reason"], "agreement");
    }
}
