use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RustyRooksError {
    // Admission / capacity errors
    CapacityExceeded,

    // Game lifecycle errors
    SessionFull,
    SessionNotFound,
    NotInGame,

    // Backend transport errors
    StoreUnavailable(String),
    BrokerError(String),

    // Rules engine errors
    IllegalMove(String),

    // Connection errors
    ConnectionClosed(String),

    // Auth errors
    AuthError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for RustyRooksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => {
                write!(f, "Server concurrent game limit reached. Please try again later")
            }
            Self::SessionFull => write!(f, "This game already has two players"),
            Self::SessionNotFound => write!(f, "Game not found"),
            Self::NotInGame => write!(f, "No active game for this connection"),
            Self::StoreUnavailable(msg) => write!(f, "Session store unavailable: {}", msg),
            Self::BrokerError(msg) => write!(f, "Message broker error: {}", msg),
            Self::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
            Self::ConnectionClosed(id) => write!(f, "Connection closed: {}", id),
            Self::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RustyRooksError {}

impl RustyRooksError {
    /// Message shown to clients. Transport-level details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::StoreUnavailable(_) | Self::BrokerError(_) => {
                "Server error, please retry".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Generic result type for RustyRooks
pub type Result<T> = std::result::Result<T, RustyRooksError>;

/// A user-visible failure annotated with its delivery scope: which connection
/// caused it and whether the whole session should hear about it. Controllers
/// return this so the dispatch layer can route the `error` event without
/// inspecting error variants.
#[derive(Debug)]
pub struct ScopedError {
    pub error: RustyRooksError,
    pub connection_id: String,
    /// When true the error affects the whole session, not just the initiator
    pub broadcast: bool,
    /// Game to broadcast into; required when `broadcast` is set
    pub game_id: Option<String>,
}

impl ScopedError {
    /// Error shown only to the offending connection
    pub fn local(error: RustyRooksError, connection_id: &str) -> Self {
        Self {
            error,
            connection_id: connection_id.to_string(),
            broadcast: false,
            game_id: None,
        }
    }

    /// Error the whole session should see (e.g. a failed state save)
    pub fn session(error: RustyRooksError, connection_id: &str, game_id: &str) -> Self {
        Self {
            error,
            connection_id: connection_id.to_string(),
            broadcast: true,
            game_id: Some(game_id.to_string()),
        }
    }
}

impl fmt::Display for ScopedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (connection {})", self.error, self.connection_id)
    }
}

impl Error for ScopedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}
