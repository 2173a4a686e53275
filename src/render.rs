use std::collections::BTreeSet;
use std::time::Duration;

use askama::Template;

use crate::ranking::RankingLedger;
use crate::round::{EndReason, GuessReport, Round, RoundSummary};

const PLACEHOLDER: char = '_';

/// Renders the hidden word: revealed letters uppercase, other letters as
/// placeholders, anything else (spaces, hyphens) verbatim.
pub fn masked(word: &str, revealed: &BTreeSet<char>) -> String {
    word.chars()
        .map(|c| {
            let lower = c.to_lowercase().next().unwrap_or(c);
            if !c.is_alphabetic() {
                c.to_string()
            } else if revealed.contains(&lower) {
                c.to_uppercase().to_string()
            } else {
                PLACEHOLDER.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

struct Standing {
    position: usize,
    name: String,
    score: u32,
}

struct TallyLine {
    name: String,
    guesses: String,
    points: u32,
    total: u32,
}

// ─── Templates ────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "round_start.html")]
struct RoundStartTemplate<'a> {
    masked: String,
    hint: &'a str,
    letters: usize,
    attempts: u32,
    minutes: u64,
}

#[derive(Template)]
#[template(path = "guess.html")]
struct GuessTemplate<'a> {
    player: &'a str,
    guess: &'a str,
    correct: bool,
    masked: &'a str,
    attempts_left: u32,
}

#[derive(Template)]
#[template(path = "summary.html")]
struct SummaryTemplate<'a> {
    reason: &'static str,
    word: String,
    hint: &'a str,
    winners: Vec<TallyLine>,
    misses: Vec<TallyLine>,
    ranking: Vec<Standing>,
}

#[derive(Template)]
#[template(path = "daily_ranking.html")]
struct DailyRankingTemplate {
    ranking: Vec<Standing>,
}

fn standings(scores: &[(String, u32)]) -> Vec<Standing> {
    scores
        .iter()
        .enumerate()
        .map(|(i, (name, score))| Standing {
            position: i + 1,
            name: name.clone(),
            score: *score,
        })
        .collect()
}

fn reason_text(reason: EndReason) -> &'static str {
    match reason {
        EndReason::Expired => "⏰ Time is up.",
        EndReason::WordGuessed => "🎉 The word was guessed!",
        EndReason::Revealed => "🎉 Every letter was found!",
        EndReason::AttemptsExhausted => "💀 Everyone ran out of attempts.",
        EndReason::Manual => "🛑 Round ended.",
    }
}

pub fn round_start(round: &Round, duration: Duration) -> askama::Result<String> {
    RoundStartTemplate {
        masked: round.masked(),
        hint: &round.hint,
        letters: round.letter_count(),
        attempts: round.scoring().attempts,
        minutes: duration.as_secs().div_ceil(60),
    }
    .render()
}

pub fn guess_feedback(player: &str, report: &GuessReport) -> askama::Result<String> {
    GuessTemplate {
        player,
        guess: &report.guess,
        correct: report.outcome.is_correct(),
        masked: &report.masked,
        attempts_left: report.attempts_left,
    }
    .render()
}

/// End-of-round message, including the current daily ranking.
pub fn summary(summary: &RoundSummary, ledger: &RankingLedger) -> askama::Result<String> {
    let line = |tally: &crate::round::Tally| TallyLine {
        name: tally.player.name.clone(),
        guesses: tally.guesses.join(", "),
        points: tally.points,
        total: ledger.score(&tally.player.name),
    };

    SummaryTemplate {
        reason: reason_text(summary.reason),
        word: summary.word.to_uppercase(),
        hint: &summary.hint,
        winners: summary.winners.iter().map(line).collect(),
        misses: summary.misses.iter().map(line).collect(),
        ranking: standings(&ledger.snapshot()),
    }
    .render()
}

pub fn daily_ranking(scores: &[(String, u32)]) -> askama::Result<String> {
    DailyRankingTemplate {
        ranking: standings(scores),
    }
    .render()
}

pub fn cooldown_notice(remaining: Duration) -> String {
    let secs = remaining.as_secs().max(1);
    if secs >= 60 {
        format!("⏳ Wait {} min before the next round.", secs.div_ceil(60))
    } else {
        format!("⏳ Wait {secs} s before the next round.")
    }
}

pub fn already_active(masked: &str) -> String {
    format!("🎯 A round is already running!\n\n🔠 {masked}")
}

pub const GREETING: &str = "👋 Send /hangman to start a round. Guess one letter at a time or the whole word.";
pub const WORDS_UNAVAILABLE: &str = "⚠️ Could not load words, try again later.";
pub const NEW_ROUND_BUTTON: &str = "🔄 New round";
