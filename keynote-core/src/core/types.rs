//! Notification value types
//!
//! A notification channel has the shape `__<category>@<db>__:<suffix>`:
//!
//! - `__keyspace@0__:foo` carries the event name (`set`, `del`, ...) for key `foo`
//! - `__keyevent@0__:set` carries the affected key for event `set`
//!
//! Subscription acknowledgements travel on the same stream as pattern
//! messages, so both are represented by [`Message`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::ConfigurationError;

/// Configuration parameter used to enable notifications on the server
///
/// Notifications are disabled by default. The value is a set of flag
/// characters:
///
/// ```text
/// K     Keyspace events, published with __keyspace@<db>__ prefix.
/// E     Keyevent events, published with __keyevent@<db>__ prefix.
/// g     Generic commands (non-type specific) like DEL, EXPIRE, RENAME, ...
/// $     String commands
/// l     List commands
/// s     Set commands
/// h     Hash commands
/// z     Sorted set commands
/// x     Expired events (events generated every time a key expires)
/// e     Evicted events (events generated when a key is evicted for maxmemory)
/// A     Alias for g$lshzxe, so that the "AKE" string means all the events.
/// ```
///
/// Setting it from a client affects every other client of the server, so it
/// should ideally live in `redis.conf`.
pub const NOTIFICATIONS_SETTING_KEY: &str = "notify-keyspace-events";

/// Wire name of a pattern-matching message
pub const PMESSAGE_TYPE: &str = "pmessage";

/// Wire name of a pattern subscription acknowledgement
pub const PSUBSCRIBE_TYPE: &str = "psubscribe";

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// `__keyevent@<db>__:<event>`, payload is the key
    KeyEvent,
    /// `__keyspace@<db>__:<key>`, payload is the event
    KeySpace,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::KeyEvent => "keyevent",
            Category::KeySpace => "keyspace",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database selector used in patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Database {
    /// A single numbered database
    Index(u32),
    /// Every database (`*`)
    Any,
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Database::Index(index) => write!(f, "{}", index),
            Database::Any => f.write_str("*"),
        }
    }
}

impl From<u32> for Database {
    fn from(index: u32) -> Self {
        Database::Index(index)
    }
}

impl FromStr for Database {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "*" {
            return Ok(Database::Any);
        }
        trimmed
            .parse::<u32>()
            .map(Database::Index)
            .map_err(|_| ConfigurationError::InvalidDatabase(s.to_string()))
    }
}

impl TryFrom<&str> for Database {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for Database {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Database::Index(index) => serializer.serialize_u32(*index),
            Database::Any => serializer.serialize_str("*"),
        }
    }
}

impl<'de> Deserialize<'de> for Database {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Index(index) => Ok(Database::Index(index)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Message type on the subscription stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Pattern subscription acknowledgement
    #[serde(rename = "psubscribe")]
    SubscribeAck,
    /// Notification received through a pattern match
    #[serde(rename = "pmessage")]
    PatternMessage,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::SubscribeAck => PSUBSCRIBE_TYPE,
            MessageKind::PatternMessage => PMESSAGE_TYPE,
        }
    }
}

/// Message payload
///
/// Acknowledgements carry the running subscription count, pattern messages
/// carry text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Count(u64),
    Text(String),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Count(_) => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Payload::Count(count) => Some(*count),
            Payload::Text(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Count(count) => write!(f, "{}", count),
            Payload::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<u64> for Payload {
    fn from(count: u64) -> Self {
        Payload::Count(count)
    }
}

/// A message received from the subscription stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Subscribed pattern that matched (absent for acknowledgements)
    pub pattern: Option<String>,
    /// Originating channel (the pattern itself for acknowledgements)
    pub channel: String,
    pub data: Payload,
}

impl Message {
    /// Build the acknowledgement for the `count`-th pattern of a session
    pub fn subscribe_ack(pattern: impl Into<String>, count: u64) -> Self {
        Self {
            kind: MessageKind::SubscribeAck,
            pattern: None,
            channel: pattern.into(),
            data: Payload::Count(count),
        }
    }

    /// Build a pattern message
    pub fn pattern_message(
        pattern: impl Into<String>,
        channel: impl Into<String>,
        data: impl Into<Payload>,
    ) -> Self {
        Self {
            kind: MessageKind::PatternMessage,
            pattern: Some(pattern.into()),
            channel: channel.into(),
            data: data.into(),
        }
    }

    pub fn is_pattern_message(&self) -> bool {
        self.kind == MessageKind::PatternMessage
    }

    /// Parse the originating channel
    pub fn channel_info(&self) -> Option<ChannelInfo> {
        ChannelInfo::parse(&self.channel)
    }

    /// Key affected by a pattern message, whichever category it came through
    pub fn key(&self) -> Option<&str> {
        if !self.is_pattern_message() {
            return None;
        }
        match channel_category(&self.channel)? {
            Category::KeySpace => channel_suffix(&self.channel),
            Category::KeyEvent => self.data.as_text(),
        }
    }

    /// Event of a pattern message, whichever category it came through
    pub fn event(&self) -> Option<&str> {
        if !self.is_pattern_message() {
            return None;
        }
        match channel_category(&self.channel)? {
            Category::KeySpace => self.data.as_text(),
            Category::KeyEvent => channel_suffix(&self.channel),
        }
    }
}

/// Components of a concrete notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub category: Category,
    pub database: u32,
    pub suffix: String,
}

impl ChannelInfo {
    /// Parse `__<category>@<db>__:<suffix>`
    ///
    /// Keys may themselves contain `:`, only the first separator after the
    /// prefix is significant.
    pub fn parse(channel: &str) -> Option<Self> {
        let category = channel_category(channel)?;
        let rest = channel.strip_prefix("__")?;
        let (_, rest) = rest.split_once('@')?;
        let (db, suffix) = rest.split_once("__:")?;
        let database = db.parse().ok()?;

        Some(Self {
            category,
            database,
            suffix: suffix.to_string(),
        })
    }
}

fn channel_category(channel: &str) -> Option<Category> {
    if channel.starts_with("__keyspace@") {
        Some(Category::KeySpace)
    } else if channel.starts_with("__keyevent@") {
        Some(Category::KeyEvent)
    } else {
        None
    }
}

fn channel_suffix(channel: &str) -> Option<&str> {
    channel.split_once("__:").map(|(_, suffix)| suffix)
}
