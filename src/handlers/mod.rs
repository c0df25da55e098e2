//! Request handlers for the worker's endpoints

pub mod websocket;

// Re-export the websocket handler and its shared state
pub use websocket::{handle_ws_client, AppContext};
