use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default multiplier for the exponential backoff on listener errors
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Host service configuration
///
/// Mirrors the configuration document the subscriber is deployed with:
///
/// ```json
/// {
///     "REDIS_URIS": {"MY_REDIS": "redis://localhost:6379/0"},
///     "REDIS": {"notification_events": "KEA", "pubsub_backoff_factor": 2}
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Redis endpoints by config key
    #[serde(rename = "REDIS_URIS", default)]
    pub redis_uris: HashMap<String, String>,

    /// Notification settings shared by every subscriber
    #[serde(rename = "REDIS", default)]
    pub redis: RedisSettings,
}

/// Redis notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Value pushed to `notify-keyspace-events` before subscribing
    #[serde(default)]
    pub notification_events: Option<String>,

    /// Backoff factor in seconds
    #[serde(default = "default_backoff_factor")]
    pub pubsub_backoff_factor: f64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            notification_events: None,
            pubsub_backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR
}

/// A single value or a sequence of values
///
/// Subscription interests accept either form; both normalize to an ordered
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<String>> for OneOrMany<String> {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany<String> {
    fn from(values: [&str; N]) -> Self {
        OneOrMany::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

impl From<&[&str]> for OneOrMany<String> {
    fn from(values: &[&str]) -> Self {
        OneOrMany::Many(values.iter().map(|v| v.to_string()).collect())
    }
}
