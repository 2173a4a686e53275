use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{GameConfig, WordEntry};

/// Resolves a path relative to the config directory.
fn config_path(sub: &str) -> PathBuf {
    let base = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
    Path::new(&base).join(sub)
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), ConfigError> {
    let data = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Initialize config directory with defaults if missing.
pub fn init() -> Result<(), ConfigError> {
    let base = config_path("");
    if !base.exists() {
        fs::create_dir_all(&base).map_err(|source| ConfigError::Io {
            path: base.clone(),
            source,
        })?;
    }

    let game_path = config_path("game.json");
    if !game_path.exists() {
        let defaults = serde_json::to_value(GameConfig::default()).map_err(|source| {
            ConfigError::Parse {
                path: game_path.clone(),
                source,
            }
        })?;
        write_json(&game_path, &defaults)?;
    }

    let words_path = config_path("words.json");
    if !words_path.exists() {
        let example = serde_json::json!([
            { "word": "elephant", "hint": "The largest land animal" },
            { "word": "guitar", "hint": "Six strings" },
            { "word": "ice cream", "hint": "Cold dessert" },
            "volcano"
        ]);
        write_json(&words_path, &example)?;
    }

    Ok(())
}

/// Load and validate the game configuration.
pub fn load_game_config() -> Result<GameConfig, ConfigError> {
    let path = config_path("game.json");
    parse_game_config(&read(&path)?).map_err(|err| match err {
        ConfigError::Parse { source, .. } => ConfigError::Parse { path, source },
        other => other,
    })
}

fn parse_game_config(data: &str) -> Result<GameConfig, ConfigError> {
    let mut config: GameConfig =
        serde_json::from_str(data).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("game.json"),
            source,
        })?;

    if config.attempts_per_player == 0 {
        return Err(ConfigError::Invalid("attemptsPerPlayer must be at least 1".into()));
    }
    if config.round_seconds == 0 {
        return Err(ConfigError::Invalid("roundSeconds must be at least 1".into()));
    }
    if config.word_points <= config.letter_points {
        return Err(ConfigError::Invalid(
            "wordPoints must be greater than letterPoints".into(),
        ));
    }
    if config.recent_words == 0 {
        return Err(ConfigError::Invalid("recentWords must be at least 1".into()));
    }
    config.kept_messages = config.kept_messages.clamp(1, 2);

    Ok(config)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusRecord {
    Bare(String),
    Entry(WordEntry),
}

/// Load the word corpus from words.json.
pub fn load_words() -> Result<Vec<WordEntry>, ConfigError> {
    let path = config_path("words.json");
    if !path.exists() {
        return Ok(vec![]);
    }
    let data = read(&path)?;
    parse_words(&data).map_err(|source| ConfigError::Parse { path, source })
}

fn parse_words(data: &str) -> Result<Vec<WordEntry>, serde_json::Error> {
    let records: Vec<CorpusRecord> = serde_json::from_str(data)?;
    let mut seen = HashSet::new();

    let words = records
        .into_iter()
        .filter_map(|record| {
            let (word, hint) = match record {
                CorpusRecord::Bare(word) => (word, None),
                CorpusRecord::Entry(entry) => (entry.word, Some(entry.hint)),
            };
            let word = word.trim().to_lowercase();
            if word.is_empty() || !seen.insert(word.clone()) {
                return None;
            }
            let hint = hint
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| {
                    let letters = word.chars().filter(|c| c.is_alphabetic()).count();
                    format!("{letters} letters")
                });
            Some(WordEntry { word, hint })
        })
        .collect();

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = parse_game_config(r#"{ "roundSeconds": 300, "rankingTime": "21:05" }"#).unwrap();
        assert_eq!(config.round_seconds, 300);
        assert_eq!(config.attempts_per_player, 3);
        assert_eq!(config.restart_delay_seconds, Some(30));
        assert_eq!(config.ranking_time, NaiveTime::from_hms_opt(21, 5, 0).unwrap());
        assert!(config.allowed_chats.is_empty());
    }

    #[test]
    fn rejects_word_points_not_above_letter_points() {
        let err = parse_game_config(r#"{ "letterPoints": 3, "wordPoints": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_ranking_time() {
        assert!(parse_game_config(r#"{ "rankingTime": "half past eleven" }"#).is_err());
    }

    #[test]
    fn restart_can_be_disabled_and_trail_is_clamped() {
        let config =
            parse_game_config(r#"{ "restartDelaySeconds": null, "keptMessages": 9 }"#).unwrap();
        assert_eq!(config.restart_delay_seconds, None);
        assert_eq!(config.kept_messages, 2);
    }

    #[test]
    fn corpus_accepts_records_and_bare_words() {
        let words = parse_words(
            r#"[
                { "word": " Elephant ", "hint": "Big" },
                "Ice Cream",
                { "word": "elephant", "hint": "Duplicate" },
                "  ",
                { "word": "owl", "hint": "" }
            ]"#,
        )
        .unwrap();

        assert_eq!(
            words,
            vec![
                WordEntry { word: "elephant".into(), hint: "Big".into() },
                WordEntry { word: "ice cream".into(), hint: "8 letters".into() },
                WordEntry { word: "owl".into(), hint: "3 letters".into() },
            ]
        );
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = serde_json::to_string(&GameConfig::default()).unwrap();
        assert!(json.contains(r#""rankingTime":"23:30""#));
        let config = parse_game_config(&json).unwrap();
        assert_eq!(config.word_points, 3);
    }
}
