//! Error types for the subscriber
//!
//! Only [`ConfigurationError`] ever crosses the public setup boundary.
//! [`TransportError`] and [`ListenerError`] are consumed by the listener loop,
//! logged, and turned into a backoff-and-retry.

use thiserror::Error;

/// Invalid subscriber configuration, detected before any connection attempt
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Neither events nor keys were configured
    #[error("Provide either `events` or `keys` to get notifications")]
    MissingInterests,

    /// The URI config key has no entry in `REDIS_URIS`
    #[error("no Redis URI configured for key '{0}'")]
    UnknownUriKey(String),

    /// Backoff factor is negative, NaN or infinite
    #[error("invalid pubsub backoff factor {0}: must be a finite number >= 0")]
    InvalidBackoffFactor(f64),

    /// Database selector is neither an index nor `*`
    #[error("invalid database selector '{0}': expected an index or '*'")]
    InvalidDatabase(String),
}

/// Failure reported by a pub/sub transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("{0}")]
    Other(String),
}

/// Transient failure inside one listener attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    /// Connecting or opening a subscription handle failed
    #[error("failed to connect: {0}")]
    Connect(#[source] TransportError),

    /// Pushing the notification setting failed
    #[error("failed to push notification config: {0}")]
    Config(#[source] TransportError),

    /// Subscribing a pattern failed
    #[error("failed to subscribe to '{pattern}': {source}")]
    Subscribe {
        pattern: String,
        #[source]
        source: TransportError,
    },

    /// Pulling the next message failed
    #[error("failed to receive message: {0}")]
    Listen(#[source] TransportError),
}

impl ListenerError {
    /// Short label used in logs and stats
    pub fn kind(&self) -> &'static str {
        match self {
            ListenerError::Connect(_) => "connect",
            ListenerError::Config(_) => "config",
            ListenerError::Subscribe { .. } => "subscribe",
            ListenerError::Listen(_) => "listen",
        }
    }
}
