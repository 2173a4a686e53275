use std::collections::{BTreeSet, HashMap};

use tokio::time::Instant;
use uuid::Uuid;

use crate::ranking::RankingLedger;
use crate::render;
use crate::types::{ChatId, Player, UserId, WordEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Expired,
    WordGuessed,
    Revealed,
    AttemptsExhausted,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    /// Not a guess, or the round is no longer accepting input.
    Ignored,
    NoAttemptsLeft,
    AlreadyGuessed,
    LetterCorrect,
    LetterWrong,
    WordCorrect,
    WordWrong,
}

impl GuessOutcome {
    pub fn is_correct(self) -> bool {
        matches!(self, Self::LetterCorrect | Self::WordCorrect)
    }

    /// Whether the guess changed the board or someone's attempts.
    pub fn counts(self) -> bool {
        matches!(
            self,
            Self::LetterCorrect | Self::LetterWrong | Self::WordCorrect | Self::WordWrong
        )
    }
}

/// Attempt budget and point weights for a round.
#[derive(Debug, Clone, Copy)]
pub struct Scoring {
    pub attempts: u32,
    pub letter_points: u32,
    pub word_points: u32,
}

/// What one player got right (or wrong) during a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub player: Player,
    pub guesses: Vec<String>,
    pub points: u32,
}

/// Result of applying a single guess.
#[derive(Debug, Clone)]
pub struct GuessReport {
    pub outcome: GuessOutcome,
    pub guess: String,
    pub attempts_left: u32,
    pub masked: String,
    /// Present when this guess ended the round.
    pub summary: Option<RoundSummary>,
}

/// Everything needed to announce the end of a round.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round_id: Uuid,
    pub chat_id: ChatId,
    pub word: String,
    pub hint: String,
    pub reason: EndReason,
    pub winners: Vec<Tally>,
    pub misses: Vec<Tally>,
}

/// One hangman game in one chat.
#[derive(Debug, Clone)]
pub struct Round {
    pub id: Uuid,
    pub chat_id: ChatId,
    pub word: String,
    pub hint: String,
    pub started_at: Instant,
    revealed: BTreeSet<char>,
    wrong: BTreeSet<char>,
    attempts: HashMap<UserId, u32>,
    correct_tally: Vec<Tally>,
    wrong_tally: Vec<Tally>,
    status: RoundStatus,
    end_reason: Option<EndReason>,
    scoring: Scoring,
}

impl Round {
    pub fn new(chat_id: ChatId, entry: WordEntry, scoring: Scoring) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            word: entry.word.to_lowercase(),
            hint: entry.hint,
            started_at: Instant::now(),
            revealed: BTreeSet::new(),
            wrong: BTreeSet::new(),
            attempts: HashMap::new(),
            correct_tally: Vec::new(),
            wrong_tally: Vec::new(),
            status: RoundStatus::Active,
            end_reason: None,
            scoring,
        }
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    #[cfg(test)]
    pub fn revealed(&self) -> &BTreeSet<char> {
        &self.revealed
    }

    #[cfg(test)]
    pub fn wrong_letters(&self) -> &BTreeSet<char> {
        &self.wrong
    }

    pub fn attempts_left(&self, player: UserId) -> Option<u32> {
        self.attempts.get(&player).copied()
    }

    pub fn masked(&self) -> String {
        render::masked(&self.word, &self.revealed)
    }

    pub fn letter_count(&self) -> usize {
        self.word.chars().filter(|c| c.is_alphabetic()).count()
    }

    pub fn is_fully_revealed(&self) -> bool {
        self.word
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| self.revealed.contains(&c))
    }

    fn attempts_exhausted(&self) -> bool {
        !self.attempts.is_empty() && self.attempts.values().all(|left| *left == 0)
    }

    pub fn apply_guess(&mut self, player: &Player, raw: &str, ledger: &RankingLedger) -> GuessReport {
        let guess = raw.trim().to_lowercase();
        let outcome = self.evaluate(player, &guess, ledger);

        if outcome.counts() && self.status == RoundStatus::Active {
            if self.is_fully_revealed() {
                self.end(EndReason::Revealed);
            } else if self.attempts_exhausted() {
                self.end(EndReason::AttemptsExhausted);
            }
        }

        GuessReport {
            outcome,
            attempts_left: self.attempts_left(player.id).unwrap_or(0),
            masked: self.masked(),
            summary: (self.status == RoundStatus::Ended).then(|| self.summary()),
            guess,
        }
    }

    fn evaluate(&mut self, player: &Player, guess: &str, ledger: &RankingLedger) -> GuessOutcome {
        if self.status != RoundStatus::Active || guess.is_empty() || guess.starts_with('/') {
            return GuessOutcome::Ignored;
        }

        let mut chars = guess.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_alphabetic() => return GuessOutcome::Ignored,
            (Some(c), None) => Some(c),
            _ => None,
        };

        let budget = self.scoring.attempts;
        let left = self.attempts.entry(player.id).or_insert(budget);
        if *left == 0 {
            return GuessOutcome::NoAttemptsLeft;
        }

        match letter {
            None if guess == self.word => {
                let points = self.scoring.word_points;
                ledger.credit(&player.name, points);
                record(&mut self.correct_tally, player, guess, points);
                self.revealed
                    .extend(self.word.chars().filter(|c| c.is_alphabetic()));
                self.end(EndReason::WordGuessed);
                GuessOutcome::WordCorrect
            }
            None => {
                *left -= 1;
                record(&mut self.wrong_tally, player, guess, 0);
                GuessOutcome::WordWrong
            }
            Some(c) if self.revealed.contains(&c) || self.wrong.contains(&c) => {
                GuessOutcome::AlreadyGuessed
            }
            Some(c) if self.word.contains(c) => {
                let points = self.scoring.letter_points;
                self.revealed.insert(c);
                ledger.credit(&player.name, points);
                record(&mut self.correct_tally, player, guess, points);
                GuessOutcome::LetterCorrect
            }
            Some(c) => {
                *left -= 1;
                self.wrong.insert(c);
                record(&mut self.wrong_tally, player, guess, 0);
                GuessOutcome::LetterWrong
            }
        }
    }

    /// Moves the round to `Ended`. The first reason wins.
    pub fn end(&mut self, reason: EndReason) {
        if self.status == RoundStatus::Active {
            self.status = RoundStatus::Ended;
            self.end_reason = Some(reason);
        }
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            round_id: self.id,
            chat_id: self.chat_id,
            word: self.word.clone(),
            hint: self.hint.clone(),
            reason: self.end_reason.unwrap_or(EndReason::Manual),
            winners: self.correct_tally.clone(),
            misses: self.wrong_tally.clone(),
        }
    }
}

fn record(tallies: &mut Vec<Tally>, player: &Player, guess: &str, points: u32) {
    match tallies.iter_mut().find(|t| t.player.id == player.id) {
        Some(tally) => {
            tally.guesses.push(guess.to_string());
            tally.points += points;
        }
        None => tallies.push(Tally {
            player: player.clone(),
            guesses: vec![guess.to_string()],
            points,
        }),
    }
}
