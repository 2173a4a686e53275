use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid game config: {0}")]
    Invalid(String),
}

/// The corpus has no word to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("word corpus is empty")]
pub struct EmptyCorpus;

/// Why a round could not be started in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("a round is already active in this chat")]
    AlreadyActive,
    #[error("next round allowed in {0:?}")]
    Cooldown(Duration),
    #[error(transparent)]
    EmptyCorpus(#[from] EmptyCorpus),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat api rejected {method}: {description}")]
    Api { method: &'static str, description: String },
}
