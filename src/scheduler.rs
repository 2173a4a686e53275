use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::game::Game;
use crate::types::ChatId;

/// How often the wall clock is compared against the daily ranking time.
const RANKING_TICK: Duration = Duration::from_secs(30);

/// Timed work delivered back to the game loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledEvent {
    /// The active window of this round instance elapsed.
    Expired { chat_id: ChatId, round_id: Uuid },
    /// Time to open a fresh round after an expired one.
    Restart { chat_id: ChatId },
}

/// Waits out a round's active window unless cancelled first.
pub async fn run_expiry(
    after: Duration,
    chat_id: ChatId,
    round_id: Uuid,
    events: mpsc::Sender<ScheduledEvent>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = tokio::time::sleep(after) => {
            let _ = events.send(ScheduledEvent::Expired { chat_id, round_id }).await;
        }
        _ = cancel_rx.changed() => {
            tracing::debug!("Expiry timer for round {} cancelled", round_id);
        }
    }
}

pub fn schedule_restart(after: Duration, chat_id: ChatId, events: mpsc::Sender<ScheduledEvent>) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = events.send(ScheduledEvent::Restart { chat_id }).await;
    });
}

/// True when `now` falls in the ranking minute and the ranking has not been
/// sent yet that day.
pub fn ranking_due(now: NaiveDateTime, at: NaiveTime, last_sent: Option<NaiveDate>) -> bool {
    now.hour() == at.hour() && now.minute() == at.minute() && last_sent != Some(now.date())
}

/// Broadcasts and resets the daily ranking at `at` local time, forever.
pub async fn run_daily_ranking(game: Arc<Game>, at: NaiveTime) {
    let mut tick = tokio::time::interval(RANKING_TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_sent = None;

    loop {
        tick.tick().await;
        let now = Local::now().naive_local();
        if ranking_due(now, at, last_sent) {
            last_sent = Some(now.date());
            game.broadcast_daily_ranking().await;
        }
    }
}
