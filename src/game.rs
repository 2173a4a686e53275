use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::StartError;
use crate::ranking::RankingLedger;
use crate::registry::Registry;
use crate::render;
use crate::round::{GuessOutcome, RoundSummary};
use crate::scheduler::{self, ScheduledEvent};
use crate::transport::{Button, Outbox};
use crate::types::{ChatId, GameConfig, NEW_ROUND_TAG, Player};

/// An inbound chat event, independent of the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub player: Player,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Text(String),
    Button { tag: String, callback_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Greet,
    StartRound,
    EndRound,
    Other,
}

/// Who asked for a new round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Player,
    Restart,
}

/// Routes every inbound event to the current round of its chat.
pub struct Game {
    config: GameConfig,
    registry: Registry,
    ledger: Arc<RankingLedger>,
    outbox: Outbox,
    events: mpsc::Sender<ScheduledEvent>,
}

impl Game {
    pub fn new(
        config: GameConfig,
        registry: Registry,
        ledger: Arc<RankingLedger>,
        outbox: Outbox,
        events: mpsc::Sender<ScheduledEvent>,
    ) -> Self {
        Self {
            config,
            registry,
            ledger,
            outbox,
            events,
        }
    }

    fn parse_command(&self, text: &str) -> Option<Command> {
        let first = text.split_whitespace().next()?;
        if !first.starts_with('/') {
            return None;
        }
        let name = first.split('@').next().unwrap_or(first).to_lowercase();
        let command = if name == self.config.start_command {
            Command::StartRound
        } else if name == self.config.end_command {
            Command::EndRound
        } else if name == "/start" {
            Command::Greet
        } else {
            Command::Other
        };
        Some(command)
    }

    pub async fn handle(&self, event: InboundEvent) {
        if !self.config.chat_allowed(event.chat_id) {
            tracing::debug!("Ignoring event from chat {} outside the allow-list", event.chat_id);
            return;
        }

        match event.kind {
            InboundKind::Text(text) => match self.parse_command(&text) {
                Some(Command::Greet) => {
                    self.outbox.send(event.chat_id, render::GREETING, None).await;
                }
                Some(Command::StartRound) => self.start_round(event.chat_id, Trigger::Player).await,
                Some(Command::EndRound) => self.end_round(event.chat_id, &event.player).await,
                Some(Command::Other) => {}
                None => self.guess(event.chat_id, &event.player, &text).await,
            },
            InboundKind::Button { tag, callback_id } => {
                self.outbox.acknowledge(&callback_id).await;
                if tag == NEW_ROUND_TAG {
                    self.start_round(event.chat_id, Trigger::Player).await;
                }
            }
        }
    }

    async fn start_round(&self, chat_id: ChatId, trigger: Trigger) {
        let notice = match self.registry.try_start(chat_id).await {
            Ok(round) => match render::round_start(&round, self.registry.settings().duration) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to render round start: {}", e);
                    return;
                }
            },
            Err(_) if trigger == Trigger::Restart => {
                tracing::debug!("Skipping automatic restart in chat {}", chat_id);
                return;
            }
            Err(StartError::AlreadyActive) => match self.registry.get(chat_id).await {
                Some(round) => render::already_active(&round.masked()),
                None => return,
            },
            Err(StartError::Cooldown(remaining)) => render::cooldown_notice(remaining),
            Err(StartError::EmptyCorpus(e)) => {
                tracing::error!("Cannot start round in chat {}: {}", chat_id, e);
                render::WORDS_UNAVAILABLE.to_string()
            }
        };

        self.outbox.send(chat_id, &notice, None).await;
    }

    async fn guess(&self, chat_id: ChatId, player: &Player, text: &str) {
        let Some(report) = self.registry.guess(chat_id, player, text).await else {
            return;
        };

        match report.outcome {
            GuessOutcome::Ignored | GuessOutcome::NoAttemptsLeft | GuessOutcome::AlreadyGuessed => {
                tracing::debug!("Guess '{}' in chat {}: {:?}", report.guess, chat_id, report.outcome);
            }
            // The summary reveals the word.
            GuessOutcome::WordCorrect => {}
            _ => match render::guess_feedback(&player.name, &report) {
                Ok(text) => {
                    self.outbox.send(chat_id, &text, None).await;
                }
                Err(e) => tracing::error!("Failed to render guess feedback: {}", e),
            },
        }

        if let Some(summary) = report.summary {
            self.announce_end(&summary).await;
        }
    }

    async fn end_round(&self, chat_id: ChatId, player: &Player) {
        if !self.config.may_end_round(player.id) {
            tracing::debug!("{} may not end rounds in chat {}", player.name, chat_id);
            return;
        }
        if let Some(summary) = self.registry.end(chat_id).await {
            self.announce_end(&summary).await;
        }
    }

    async fn announce_end(&self, summary: &RoundSummary) {
        let text = match render::summary(summary, &self.ledger) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to render round summary: {}", e);
                return;
            }
        };
        let button = Button {
            label: render::NEW_ROUND_BUTTON.to_string(),
            tag: NEW_ROUND_TAG.to_string(),
        };
        self.outbox.send(summary.chat_id, &text, Some(&button)).await;
    }

    /// Handles timer events until every sender is gone. Each event runs on
    /// its own task so a slow chat never holds up another chat's timers.
    pub async fn run_scheduled(self: Arc<Self>, mut events: mpsc::Receiver<ScheduledEvent>) {
        while let Some(event) = events.recv().await {
            let game = self.clone();
            tokio::spawn(async move { game.on_scheduled(event).await });
        }
        tracing::info!("Scheduler channel closed");
    }

    async fn on_scheduled(&self, event: ScheduledEvent) {
        match event {
            ScheduledEvent::Expired { chat_id, round_id } => {
                let Some(summary) = self.registry.expire(chat_id, round_id).await else {
                    return;
                };
                self.announce_end(&summary).await;
                if let Some(delay) = self.config.restart_delay_seconds {
                    scheduler::schedule_restart(Duration::from_secs(delay), chat_id, self.events.clone());
                }
            }
            ScheduledEvent::Restart { chat_id } => {
                self.start_round(chat_id, Trigger::Restart).await;
            }
        }
    }

    /// Sends the day's final ranking to every chat that played and resets it.
    pub async fn broadcast_daily_ranking(&self) {
        let standings = self.ledger.close_day();
        let text = match render::daily_ranking(&standings) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to render daily ranking: {}", e);
                return;
            }
        };

        let chats: Vec<ChatId> = self
            .registry
            .chats_with_history()
            .into_iter()
            .filter(|chat_id| self.config.chat_allowed(*chat_id))
            .collect();
        tracing::info!("Broadcasting daily ranking to {} chats", chats.len());

        futures::future::join_all(chats.iter().map(|chat_id| self.outbox.send(*chat_id, &text, None)))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RoundSettings;
    use crate::transport::testing::RecordingTransport;
    use crate::types::WordEntry;
    use crate::words::WordPicker;

    struct Harness {
        game: Arc<Game>,
        transport: Arc<RecordingTransport>,
        ledger: Arc<RankingLedger>,
    }

    fn harness(config: GameConfig, words: &[&str]) -> Harness {
        let corpus = words
            .iter()
            .map(|w| WordEntry {
                word: w.to_string(),
                hint: "hint".to_string(),
            })
            .collect();
        let (tx, rx) = mpsc::channel(64);
        let ledger = Arc::new(RankingLedger::new());
        let transport = Arc::new(RecordingTransport::default());
        let registry = Registry::new(
            WordPicker::new(corpus, config.recent_words),
            ledger.clone(),
            RoundSettings::from(&config),
            tx.clone(),
        );
        let outbox = Outbox::new(transport.clone(), 2);
        let game = Arc::new(Game::new(config, registry, ledger.clone(), outbox, tx));
        tokio::spawn(game.clone().run_scheduled(rx));

        Harness { game, transport, ledger }
    }

    fn config() -> GameConfig {
        GameConfig {
            round_interval_seconds: 0,
            restart_delay_seconds: None,
            ..GameConfig::default()
        }
    }

    fn text(chat_id: ChatId, user: i64, name: &str, body: &str) -> InboundEvent {
        InboundEvent {
            chat_id,
            player: Player::new(user, name),
            kind: InboundKind::Text(body.to_string()),
        }
    }

    fn summaries(transport: &RecordingTransport, chat_id: ChatId) -> usize {
        transport
            .sent()
            .iter()
            .filter(|s| s.chat_id == chat_id && s.text.contains("Round over"))
            .count()
    }

    #[tokio::test]
    async fn plays_a_round_to_a_reveal() {
        let h = harness(config(), &["cat"]);

        h.game.handle(text(1, 10, "Ana", "/hangman@HangBot")).await;
        for (user, name, guess) in [(10, "Ana", "c"), (11, "Bia", "x"), (11, "Bia", "a"), (10, "Ana", "t")] {
            h.game.handle(text(1, user, name, guess)).await;
        }

        let sent = h.transport.sent();
        assert!(sent[0].text.contains("New round"));
        assert!(sent[2].text.contains("❌ Bia: 'x'"));
        assert!(sent[2].text.contains("Attempts left: 2"));

        let last = sent.last().unwrap();
        assert!(last.text.contains("Every letter was found"));
        assert_eq!(last.button.as_ref().map(|b| b.tag.as_str()), Some(NEW_ROUND_TAG));
        assert_eq!(h.ledger.score("Ana"), 2);
        assert_eq!(h.ledger.score("Bia"), 1);
    }

    #[tokio::test]
    async fn second_start_shows_the_running_board() {
        let h = harness(config(), &["cat"]);
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;
        h.game.handle(text(1, 10, "Ana", "c")).await;
        h.game.handle(text(1, 11, "Bia", "/hangman")).await;

        let texts = h.transport.sent_to(1);
        assert_eq!(texts.last().unwrap(), "🎯 A round is already running!\n\n🔠 C _ _");
    }

    #[tokio::test]
    async fn button_starts_a_round_after_a_win() {
        let h = harness(config(), &["cat", "dog"]);
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;
        let word = h.game.registry.get(1).await.unwrap().word;
        h.game.handle(text(1, 10, "Ana", &word)).await;
        assert_eq!(summaries(&h.transport, 1), 1);

        h.game
            .handle(InboundEvent {
                chat_id: 1,
                player: Player::new(11, "Bia"),
                kind: InboundKind::Button {
                    tag: NEW_ROUND_TAG.to_string(),
                    callback_id: "cb-1".to_string(),
                },
            })
            .await;
        assert!(h.game.registry.get(1).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_end_announces_once() {
        let h = harness(config(), &["cat"]);
        h.game.handle(text(4, 10, "Ana", "/hangman")).await;
        h.game.handle(text(4, 10, "Ana", "/endround")).await;
        h.game.handle(text(4, 10, "Ana", "/endround")).await;

        tokio::time::sleep(Duration::from_secs(1200)).await;
        assert_eq!(summaries(&h.transport, 4), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_round_is_announced_and_restarted() {
        let config = GameConfig {
            restart_delay_seconds: Some(30),
            ..config()
        };
        let h = harness(config, &["cat", "dog"]);
        h.game.handle(text(4, 10, "Ana", "/hangman")).await;

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(summaries(&h.transport, 4), 1);
        assert!(h.transport.sent_to(4).last().unwrap().contains("Time is up"));
        assert!(h.game.registry.get(4).await.is_none());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.game.registry.get(4).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_announcement_does_not_hold_up_other_chats() {
        let h = harness(config(), &["cat", "dog"]);
        h.transport.stalled_summaries.lock().unwrap().push(1);
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;
        h.game.handle(text(2, 11, "Bia", "/hangman")).await;

        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert!(h.game.registry.get(1).await.is_none());
        assert!(h.game.registry.get(2).await.is_none());
        assert_eq!(summaries(&h.transport, 1), 0);
        assert_eq!(summaries(&h.transport, 2), 1);
    }

    #[tokio::test]
    async fn only_admins_end_rounds_when_configured() {
        let config = GameConfig {
            admins: vec![99],
            ..config()
        };
        let h = harness(config, &["cat"]);
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;
        h.game.handle(text(1, 10, "Ana", "/endround")).await;
        assert!(h.game.registry.get(1).await.is_some());

        h.game.handle(text(1, 99, "Mod", "/endround")).await;
        assert!(h.game.registry.get(1).await.is_none());
    }

    #[tokio::test]
    async fn chats_outside_the_allow_list_are_ignored() {
        let config = GameConfig {
            allowed_chats: vec![1],
            ..config()
        };
        let h = harness(config, &["cat"]);
        h.game.handle(text(2, 10, "Ana", "/hangman")).await;
        assert!(h.transport.sent().is_empty());
        assert!(h.game.registry.get(2).await.is_none());
    }

    #[tokio::test]
    async fn cooldown_rejects_early_starts() {
        let config = GameConfig {
            round_interval_seconds: 120,
            ..config()
        };
        let h = harness(config, &["cat"]);
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;
        h.game.handle(text(1, 10, "Ana", "/endround")).await;
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;

        assert!(h.transport.sent_to(1).last().unwrap().starts_with("⏳ Wait 2 min"));
    }

    #[tokio::test]
    async fn empty_corpus_is_reported_to_the_chat() {
        let h = harness(config(), &[]);
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;
        assert_eq!(h.transport.sent_to(1), vec![render::WORDS_UNAVAILABLE.to_string()]);
    }

    #[tokio::test]
    async fn daily_ranking_reaches_every_chat_and_resets() {
        let h = harness(config(), &["cat"]);
        h.game.handle(text(1, 10, "Ana", "/hangman")).await;
        h.game.handle(text(2, 11, "Bia", "/hangman")).await;
        h.game.handle(text(1, 10, "Ana", "c")).await;

        h.game.broadcast_daily_ranking().await;

        for chat_id in [1, 2] {
            let last = h.transport.sent_to(chat_id).pop().unwrap();
            assert!(last.contains("Final ranking of the day"));
            assert!(last.contains("1. Ana: 1"));
        }
        assert!(h.ledger.snapshot().is_empty());
    }
}
