use std::sync::Arc;

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use crate::broker::Broker;
use crate::constants::BROADCAST_KEY;
use crate::core::clients::{ClientManager, EventSink};
use crate::core::event::{ClientCommand, Event};
use crate::core::rate_limiter::TokenBucket;
use crate::error::ScopedError;
use crate::game::{GameController, PlayController};

/// Shared state every connection handler needs, built once at startup
pub struct AppContext {
    pub clients: Arc<ClientManager>,
    pub games: Arc<GameController>,
    pub play: Arc<PlayController>,
    pub rate_limiter: Arc<TokenBucket>,
    pub broker: Arc<dyn Broker>,
}

// Handle a WebSocket connection
pub async fn handle_ws_client(ws: WebSocket, ctx: Arc<AppContext>, user_id: Option<String>) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    // Admission check before any registration
    if !ctx.rate_limiter.consume() {
        warn!("Connection limit exceeded, rejecting connection");
        if let Ok(rejection) = serde_json::to_string(&Event::error("Connection limit exceeded")) {
            let _ = ws_tx.send(Message::text(rejection)).await;
        }
        let _ = ws_tx.close().await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();

    // Spawn a task to forward events from our channel to the WebSocket
    tokio::task::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    // Generate a unique connection ID
    let connection_id = Uuid::new_v4().to_string();
    ctx.clients.register(&connection_id, tx).await;

    match &user_id {
        Some(uid) => info!("Client {} connected (user {})", connection_id, uid),
        None => info!("Client {} connected (anonymous)", connection_id),
    }
    info!("Current connections: {}", ctx.clients.client_count().await);

    // Tell the client its connection id
    if let Err(e) = ctx
        .clients
        .deliver(&connection_id, &Event::connected(&connection_id))
        .await
    {
        error!("Failed to send connected event: {}", e);
    }

    // Handle incoming commands
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) => {
                // Only process text messages
                if msg.is_text() {
                    process_command(msg, &connection_id, &ctx).await;
                }
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
        }
    }

    // Client disconnected. `leave` tolerates an earlier explicit exit.
    if let Err(scoped) = ctx.games.leave(&connection_id).await {
        report_error(&ctx, scoped).await;
    }
    ctx.clients.unregister(&connection_id).await;
    info!("Client {} disconnected", connection_id);
    info!("Current connections: {}", ctx.clients.client_count().await);
}

// Process an incoming command frame
async fn process_command(msg: Message, connection_id: &str, ctx: &Arc<AppContext>) {
    let text = match msg.to_str() {
        Ok(s) => s,
        Err(_) => {
            warn!("Failed to extract text from message");
            return;
        }
    };

    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            warn!("Failed to parse command from {}: {}", connection_id, e);
            return;
        }
    };

    debug!("Command from {}: {:?}", connection_id, command);

    let outcome = match command {
        ClientCommand::Create { time_control } => ctx
            .games
            .create(connection_id, time_control)
            .await
            .map(|_| ()),
        ClientCommand::Join { game_id } => ctx.games.join(connection_id, &game_id).await,
        ClientCommand::Move { uci } => ctx.play.make_move(connection_id, &uci).await,
        ClientCommand::OfferDraw => ctx.play.offer_draw(connection_id).await,
        ClientCommand::AcceptDraw => ctx.play.accept_draw(connection_id).await,
        ClientCommand::Resign => ctx.play.resign(connection_id).await,
        ClientCommand::Flag { flagged } => ctx.play.flag(connection_id, flagged).await,
        ClientCommand::OfferRematch => ctx.games.offer_rematch(connection_id).await,
        ClientCommand::AcceptRematch => ctx.games.accept_rematch(connection_id).await,
        ClientCommand::Exit => ctx.games.leave(connection_id).await,
    };

    if let Err(scoped) = outcome {
        report_error(ctx, scoped).await;
    }
}

/// Route a user-visible failure according to its scope: broadcast into the
/// game when the whole session is affected, otherwise directly to the
/// offending connection.
async fn report_error(ctx: &AppContext, scoped: ScopedError) {
    error!("{}", scoped);
    let event = Event::error(&scoped.error.user_message());

    if scoped.broadcast {
        if let Some(game_id) = &scoped.game_id {
            if ctx.broker.publish(game_id, BROADCAST_KEY, &event).await.is_ok() {
                return;
            }
            // Broker also failing; fall through to direct delivery
        }
    }

    if let Err(e) = ctx.clients.deliver(&scoped.connection_id, &event).await {
        debug!("Could not report error to {}: {}", scoped.connection_id, e);
    }
}
