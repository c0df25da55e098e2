use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use warp::http::StatusCode;
use warp::{Filter, Reply};

use rusty_rooks::auth::TokenManager;
use rusty_rooks::broker::{AmqpBroker, Broker};
use rusty_rooks::config::ServerConfig;
use rusty_rooks::constants::WS_PATH;
use rusty_rooks::core::clients::{ClientManager, EventSink};
use rusty_rooks::core::rate_limiter::TokenBucket;
use rusty_rooks::core::registry::GameRegistry;
use rusty_rooks::error::RustyRooksError;
use rusty_rooks::game::{GameController, PlayController, RulesEngine, ShakmatyRules};
use rusty_rooks::handlers::{handle_ws_client, AppContext};
use rusty_rooks::store::{RedisSessionStore, SessionStore};

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    // Load config from .env
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration: host={}, port={}", config.host, config.port);

    // Shared session cache
    let store: Arc<dyn SessionStore> = match RedisSessionStore::connect(&config.redis_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to connect to session cache: {}", e);
            std::process::exit(1);
        }
    };

    // Message broker
    let broker: Arc<dyn Broker> = match AmqpBroker::connect(&config.amqp_url).await {
        Ok(broker) => Arc::new(broker),
        Err(e) => {
            error!("Failed to connect to message broker: {}", e);
            std::process::exit(1);
        }
    };

    // Per-worker state and controllers
    let registry = Arc::new(GameRegistry::new());
    let clients = Arc::new(ClientManager::new());
    let sink: Arc<dyn EventSink> = clients.clone();
    let rules: Arc<dyn RulesEngine> = Arc::new(ShakmatyRules::new());

    let games = Arc::new(GameController::new(
        Arc::clone(&store),
        Arc::clone(&broker),
        Arc::clone(&registry),
        sink,
        Arc::clone(&rules),
        config.concurrent_game_limit,
    ));
    let play = Arc::new(PlayController::new(
        Arc::clone(&games),
        Arc::clone(&broker),
        Arc::clone(&rules),
    ));

    // Connection admission token bucket
    let rate_limiter = Arc::new(TokenBucket::new(config.bucket_capacity));
    let refiller = Arc::clone(&rate_limiter).start_refiller(config.refill_interval);

    let ctx = Arc::new(AppContext {
        clients: Arc::clone(&clients),
        games,
        play,
        rate_limiter,
        broker,
    });

    // Identity verification at admission; in-session actions trust the
    // admitted connection id
    let verifier = Arc::new(config.jwt_secret.as_deref().map(TokenManager::new));
    let allow_anonymous = config.allow_anonymous_access;

    // Create WebSocket route
    let ws_ctx = Arc::clone(&ctx);
    let ws_route = warp::path(WS_PATH)
        .and(warp::ws())
        .and(warp::query::<HashMap<String, String>>())
        .map(move |ws: warp::ws::Ws, query: HashMap<String, String>| {
            let ctx = Arc::clone(&ws_ctx);
            let token = query.get("token").map(String::as_str);
            match authenticate(&verifier, allow_anonymous, token) {
                Ok(user_id) => ws
                    .on_upgrade(move |socket| handle_ws_client(socket, ctx, user_id))
                    .into_response(),
                Err(e) => {
                    warn!("Rejected connection: {}", e);
                    warp::reply::with_status(
                        "invalid or missing token",
                        StatusCode::UNAUTHORIZED,
                    )
                    .into_response()
                }
            }
        });

    // Create health check route
    let health_route = warp::path("health").map(|| "OK");

    // Combine routes
    let routes = ws_route.or(health_route);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Rusty Rooks worker on {}", addr);

    let (_bound, serving) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    });
    serving.await;

    // Clean up before exit: stop the refiller, drop per-worker
    // bookkeeping, and empty the session namespace
    refiller.abort();
    registry.clear().await;
    if let Err(e) = store.clear_all().await {
        warn!("Failed to clear session cache: {}", e);
    }
    info!("Shutdown complete");
}

/// Admission-time identity check. With no secret configured tokens are
/// ignored; with a secret, a presented token must verify, and a missing
/// token is only acceptable when anonymous access is enabled.
fn authenticate(
    verifier: &Option<TokenManager>,
    allow_anonymous: bool,
    token: Option<&str>,
) -> Result<Option<String>, RustyRooksError> {
    match (token, verifier) {
        (Some(token), Some(manager)) => manager.verify(token).map(Some),
        (Some(_), None) => Ok(None),
        (None, _) if allow_anonymous => Ok(None),
        (None, _) => Err(RustyRooksError::AuthError("missing token".to_string())),
    }
}
