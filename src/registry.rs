use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::StartError;
use crate::ranking::RankingLedger;
use crate::round::{EndReason, GuessReport, Round, RoundStatus, RoundSummary, Scoring};
use crate::scheduler::{self, ScheduledEvent};
use crate::types::{ChatId, GameConfig, Player};
use crate::words::WordPicker;

/// Timing and scoring applied to every round the registry starts.
#[derive(Debug, Clone, Copy)]
pub struct RoundSettings {
    pub duration: Duration,
    pub min_interval: Duration,
    pub scoring: Scoring,
}

impl From<&GameConfig> for RoundSettings {
    fn from(config: &GameConfig) -> Self {
        Self {
            duration: Duration::from_secs(config.round_seconds),
            min_interval: Duration::from_secs(config.round_interval_seconds),
            scoring: Scoring {
                attempts: config.attempts_per_player,
                letter_points: config.letter_points,
                word_points: config.word_points,
            },
        }
    }
}

/// Per-chat state guarded by the chat's own lock.
#[derive(Default)]
struct ChatSlot {
    round: Option<Round>,
    last_start: Option<Instant>,
    expiry_cancel: Option<watch::Sender<bool>>,
}

impl ChatSlot {
    /// Detaches the live round, ending it with `reason` unless it already
    /// ended, and cancels its expiry timer.
    fn detach(&mut self, reason: EndReason) -> Option<RoundSummary> {
        let mut round = self.round.take()?;
        round.end(reason);
        if let Some(cancel) = self.expiry_cancel.take() {
            let _ = cancel.send(true);
        }
        Some(round.summary())
    }
}

/// Registry owns the live round of every chat.
pub struct Registry {
    /// chat_id -> slot holding at most one live round
    slots: DashMap<ChatId, Arc<Mutex<ChatSlot>>>,
    /// chats that ever had a round
    history: DashSet<ChatId>,
    picker: Mutex<WordPicker>,
    ledger: Arc<RankingLedger>,
    settings: RoundSettings,
    events: mpsc::Sender<ScheduledEvent>,
}

impl Registry {
    pub fn new(
        picker: WordPicker,
        ledger: Arc<RankingLedger>,
        settings: RoundSettings,
        events: mpsc::Sender<ScheduledEvent>,
    ) -> Self {
        Self {
            slots: DashMap::new(),
            history: DashSet::new(),
            picker: Mutex::new(picker),
            ledger,
            settings,
            events,
        }
    }

    pub fn settings(&self) -> RoundSettings {
        self.settings
    }

    fn slot(&self, chat_id: ChatId) -> Arc<Mutex<ChatSlot>> {
        self.slots.entry(chat_id).or_default().clone()
    }

    fn existing_slot(&self, chat_id: ChatId) -> Option<Arc<Mutex<ChatSlot>>> {
        self.slots.get(&chat_id).map(|slot| slot.clone())
    }

    /// Starts a round in the chat and arms its expiry timer.
    pub async fn try_start(&self, chat_id: ChatId) -> Result<Round, StartError> {
        let slot = self.slot(chat_id);
        let mut slot = slot.lock().await;

        if slot.round.is_some() {
            return Err(StartError::AlreadyActive);
        }
        if let Some(last) = slot.last_start {
            let elapsed = last.elapsed();
            if elapsed < self.settings.min_interval {
                return Err(StartError::Cooldown(self.settings.min_interval - elapsed));
            }
        }

        let entry = self.picker.lock().await.select()?;
        let round = Round::new(chat_id, entry, self.settings.scoring);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(scheduler::run_expiry(
            self.settings.duration,
            chat_id,
            round.id,
            self.events.clone(),
            cancel_rx,
        ));

        slot.expiry_cancel = Some(cancel_tx);
        slot.last_start = Some(round.started_at);
        slot.round = Some(round.clone());
        self.history.insert(chat_id);

        tracing::info!("Round {} started in chat {}", round.id, chat_id);
        Ok(round)
    }

    pub async fn get(&self, chat_id: ChatId) -> Option<Round> {
        let slot = self.existing_slot(chat_id)?;
        let slot = slot.lock().await;
        slot.round.clone()
    }

    /// Applies a guess to the chat's live round. Returns `None` when no
    /// round is live. A guess that ends the round detaches it.
    pub async fn guess(&self, chat_id: ChatId, player: &Player, text: &str) -> Option<GuessReport> {
        let slot = self.existing_slot(chat_id)?;
        let mut slot = slot.lock().await;

        let round = slot.round.as_mut()?;
        let report = round.apply_guess(player, text, &self.ledger);

        if round.status() == RoundStatus::Ended {
            let reason = round.end_reason().unwrap_or(EndReason::Manual);
            slot.detach(reason);
            tracing::info!("Round in chat {} ended: {:?}", chat_id, reason);
        }

        Some(report)
    }

    /// Ends the chat's live round, if any.
    pub async fn end(&self, chat_id: ChatId) -> Option<RoundSummary> {
        let slot = self.existing_slot(chat_id)?;
        let summary = slot.lock().await.detach(EndReason::Manual)?;
        tracing::info!("Round {} in chat {} ended manually", summary.round_id, chat_id);
        Some(summary)
    }

    /// Ends the round only if `round_id` is still the chat's live round.
    pub async fn expire(&self, chat_id: ChatId, round_id: Uuid) -> Option<RoundSummary> {
        let slot = self.existing_slot(chat_id)?;
        let mut slot = slot.lock().await;

        if slot.round.as_ref().map(|r| r.id) != Some(round_id) {
            tracing::debug!("Stale expiry for round {} in chat {}", round_id, chat_id);
            return None;
        }
        let summary = slot.detach(EndReason::Expired)?;
        tracing::info!("Round {} in chat {} expired", round_id, chat_id);
        Some(summary)
    }

    pub fn chats_with_history(&self) -> Vec<ChatId> {
        self.history.iter().map(|chat| *chat).collect()
    }
}
