use std::fmt;

use thiserror::Error;

/// Resource-exhaustion errors (§7): never block the producer, fail fast
/// with a typed error instead.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum QueueError {
    #[error("queue is full")]
    QueueFull,
}

/// Broadcaster/channel-control errors, shaped like `jet1090::channel::ChannelError`:
/// a plain enum with a manual `Display`, not a `thiserror` derive, to match
/// the texture of the hottest-path error type in the teacher repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    ClientNotFound,
    ClientSlow,
    SendFailed,
}

impl std::error::Error for ChannelError {}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ClientNotFound => write!(f, "<ClientNotFound>"),
            ChannelError::ClientSlow => write!(f, "<ClientSlow: outbound queue full>"),
            ChannelError::SendFailed => write!(f, "<SendFailed>"),
        }
    }
}

/// Fatal startup errors (§7): the process exits non-zero after logging.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
