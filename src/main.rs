mod config;
mod error;
mod game;
mod ranking;
mod registry;
mod render;
mod round;
mod scheduler;
mod telegram;
mod transport;
mod types;
mod words;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::sync::mpsc;

use crate::game::Game;
use crate::ranking::RankingLedger;
use crate::registry::{Registry, RoundSettings};
use crate::telegram::{TelegramClient, Update};
use crate::transport::Outbox;
use crate::words::WordPicker;

#[derive(Clone)]
struct AppState {
    game: Arc<Game>,
    webhook_secret: String,
}

// ─── Routes ───────────────────────────────────────────────────────

async fn health() -> &'static str {
    "Hangman bot online!"
}

async fn webhook(
    Path(secret): Path<String>,
    State(state): State<AppState>,
    Json(update): Json<Update>,
) -> StatusCode {
    if secret != state.webhook_secret {
        return StatusCode::NOT_FOUND;
    }

    let update_id = update.update_id;
    match update.into_event() {
        Some(event) => {
            let game = state.game.clone();
            tokio::spawn(async move { game.handle(event).await });
        }
        None => tracing::debug!("Update {} carries nothing to handle", update_id),
    }

    StatusCode::OK
}

// ─── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    config::init().expect("Failed to initialize config directory");

    let game_config = config::load_game_config().expect("Failed to load game.json");
    let words = config::load_words().expect("Failed to load words.json");
    if words.is_empty() {
        tracing::warn!("Word corpus is empty, rounds cannot start");
    }
    tracing::info!("Loaded {} words", words.len());

    let token = std::env::var("TELEGRAM_TOKEN").expect("TELEGRAM_TOKEN must be set");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .expect("Invalid PORT");
    let webhook_secret = std::env::var("WEBHOOK_SECRET")
        .unwrap_or_else(|_| uuid::Uuid::new_v4().simple().to_string());

    let client = TelegramClient::new(&token).expect("Failed to build HTTP client");
    if let Ok(public_url) = std::env::var("PUBLIC_URL") {
        let url = format!("{}/webhook/{}", public_url.trim_end_matches('/'), webhook_secret);
        match client.set_webhook(&url).await {
            Ok(()) => tracing::info!("Webhook registered"),
            Err(e) => tracing::error!("Failed to register webhook: {}", e),
        }
    }

    let (events_tx, events_rx) = mpsc::channel(256);
    let ledger = Arc::new(RankingLedger::new());
    let registry = Registry::new(
        WordPicker::new(words, game_config.recent_words),
        ledger.clone(),
        RoundSettings::from(&game_config),
        events_tx.clone(),
    );
    let outbox = Outbox::new(Arc::new(client), game_config.kept_messages);
    let ranking_time = game_config.ranking_time;
    let game = Arc::new(Game::new(game_config, registry, ledger, outbox, events_tx));

    tokio::spawn(game.clone().run_scheduled(events_rx));
    tokio::spawn(scheduler::run_daily_ranking(game.clone(), ranking_time));

    let state = AppState {
        game,
        webhook_secret,
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/webhook/{secret}", post(webhook))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind");

    tracing::info!("Hangman bot listening on port {}", port);

    axum::serve(listener, app).await.expect("Server error");
}
