//! Event delivery path
//!
//! One delivery task per live (game, connection) pair, fed by the broker
//! subscription channel. Each received message is handed to its own
//! delivery attempt so the loop is ready for the next message immediately:
//! attempt order follows receipt order, completion order is not guaranteed.

use std::sync::Arc;

use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::constants::MAX_EMIT_RETRIES;
use crate::core::clients::EventSink;
use crate::core::event::Event;

/// Start the delivery loop for one player's subscription. The task ends
/// when the broker side closes the channel (consumer cancelled or queue
/// deleted).
pub fn spawn_delivery(
    connection_id: String,
    mut messages: mpsc::UnboundedReceiver<Vec<u8>>,
    sink: Arc<dyn EventSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(raw) = messages.recv().await {
            let event: Event = match serde_json::from_slice(&raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "Dropping undecodable message for connection {}: {}",
                        connection_id, e
                    );
                    continue;
                }
            };

            let sink = Arc::clone(&sink);
            let connection_id = connection_id.clone();
            tokio::spawn(async move {
                deliver_with_retry(sink.as_ref(), &connection_id, event).await;
            });
        }
        debug!("Delivery loop ended for connection {}", connection_id);
    })
}

/// Push one event to a connection, retrying immediately on failure up to
/// the retry ceiling. Delivery is best-effort: after the final attempt the
/// failure is logged and the event dropped, never surfaced to users (the
/// recipient is by definition unreachable).
pub async fn deliver_with_retry(sink: &dyn EventSink, connection_id: &str, event: Event) {
    let mut attempts: u32 = 1;
    loop {
        match sink.deliver(connection_id, &event).await {
            Ok(()) => return,
            Err(e) if attempts < MAX_EMIT_RETRIES => {
                error!(
                    "Delivery of '{}' to {} failed (attempt {}): {}, retrying...",
                    event.name, connection_id, attempts, e
                );
                attempts += 1;
            }
            Err(e) => {
                error!(
                    "Delivery of '{}' to {} failed {} times, giving up: {}",
                    event.name, connection_id, attempts, e
                );
                return;
            }
        }
    }
}
