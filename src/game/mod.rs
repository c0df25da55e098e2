//! Game domain: lifecycle, in-game actions, rules seam, event delivery

pub mod delivery;
pub mod lifecycle;
pub mod play;
pub mod rules;

// Re-export main components for convenience
pub use delivery::{deliver_with_retry, spawn_delivery};
pub use lifecycle::GameController;
pub use play::PlayController;
pub use rules::{GameOutcome, RulesEngine, ShakmatyRules};

/// Current wall-clock time in epoch milliseconds, the unit game clocks and
/// turn timestamps are kept in.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
