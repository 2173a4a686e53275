use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

pub type ChatId = i64;
pub type UserId = i64;
pub type MessageId = i64;

/// Callback data carried by the "new round" button.
pub const NEW_ROUND_TAG: &str = "new_round";

/// A chat member taking part in a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: UserId,
    pub name: String,
}

impl Player {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// A hidden word and its hint, as loaded from the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    #[serde(default)]
    pub hint: String,
}

/// Game configuration loaded from game.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub round_seconds: u64,
    pub round_interval_seconds: u64,
    pub restart_delay_seconds: Option<u64>,
    pub attempts_per_player: u32,
    pub letter_points: u32,
    pub word_points: u32,
    #[serde(with = "clock_time")]
    pub ranking_time: NaiveTime,
    pub recent_words: usize,
    pub kept_messages: usize,
    pub allowed_chats: Vec<ChatId>,
    pub admins: Vec<UserId>,
    pub start_command: String,
    pub end_command: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_seconds: 600,
            round_interval_seconds: 60,
            restart_delay_seconds: Some(30),
            attempts_per_player: 3,
            letter_points: 1,
            word_points: 3,
            ranking_time: NaiveTime::from_hms_opt(23, 30, 0).unwrap_or_default(),
            recent_words: 60,
            kept_messages: 2,
            allowed_chats: Vec::new(),
            admins: Vec::new(),
            start_command: "/hangman".to_string(),
            end_command: "/endround".to_string(),
        }
    }
}

impl GameConfig {
    /// An empty allow-list admits every chat.
    pub fn chat_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }

    pub fn may_end_round(&self, user_id: UserId) -> bool {
        self.admins.is_empty() || self.admins.contains(&user_id)
    }
}

/// `HH:MM` wall clock times.
mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}
