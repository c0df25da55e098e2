// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const WS_PATH: &str = "ws";

// Broker topology
/// Routing key that reaches every player queue bound to a game's exchange
pub const BROADCAST_KEY: &str = "all";

// Cache key layout: "game:" + game id -> serialized session
pub const GAME_KEY_PREFIX: &str = "game:";

// Event delivery gives up after this many attempts
pub const MAX_EMIT_RETRIES: u32 = 5;

// Clock arithmetic
pub const MILLISECONDS_PER_MINUTE: u64 = 60_000;
/// Sentinel for `turn_started_at` before both players are seated
pub const TURN_NOT_STARTED: i64 = -1;

// Admission defaults
pub const DEFAULT_CONCURRENT_GAME_LIMIT: usize = 100;
pub const DEFAULT_BUCKET_CAPACITY: u32 = 20;
pub const DEFAULT_REFILL_INTERVAL_MS: u64 = 1_000;
