//! Test helper utilities for driving a listener
//!
//! Provides convenient builders and utilities for:
//! - Configuration documents
//! - Collecting dispatched messages
//! - Waiting on listener state
//! - Backoff timing assertions

use crate::config::ServiceConfig;
use crate::core::Message;
use crate::engine::ListenerState;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Default URI key used by test configurations
pub const TEST_URI_KEY: &str = "TEST_REDIS";

/// Default URI used by test configurations
pub const TEST_URI: &str = "redis://localhost:6379/0";

/// Create a test configuration with one URI
pub fn create_test_config(notification_events: Option<&str>, backoff_factor: f64) -> ServiceConfig {
    let mut config = ServiceConfig {
        redis_uris: HashMap::from([(TEST_URI_KEY.to_string(), TEST_URI.to_string())]),
        ..Default::default()
    };
    config.redis.notification_events = notification_events.map(str::to_string);
    config.redis.pubsub_backoff_factor = backoff_factor;
    config
}

/// Dispatcher forwarding into a channel, and the receiving end
pub fn channel_dispatcher() -> (mpsc::UnboundedSender<Message>, mpsc::UnboundedReceiver<Message>) {
    mpsc::unbounded_channel()
}

/// Receive one message, or `None` if nothing arrives within `timeout`
pub async fn next_message_within(
    rx: &mut mpsc::UnboundedReceiver<Message>,
    timeout: Duration,
) -> Option<Message> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}

/// Receive `count` messages, stopping early when `timeout` elapses between two
pub async fn collect_messages(
    rx: &mut mpsc::UnboundedReceiver<Message>,
    count: usize,
    timeout: Duration,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(count);
    while messages.len() < count {
        match next_message_within(rx, timeout).await {
            Some(message) => messages.push(message),
            None => break,
        }
    }
    messages
}

/// Only the pattern messages of `messages`
pub fn pattern_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.is_pattern_message()).collect()
}

/// Wait until the observed state equals `state`
///
/// Returns `false` if the sender went away first.
pub async fn wait_for_state(rx: &mut watch::Receiver<ListenerState>, state: ListenerState) -> bool {
    rx.wait_for(|current| *current == state).await.is_ok()
}

/// Time between consecutive instants
pub fn gaps(instants: &[Instant]) -> Vec<Duration> {
    instants
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect()
}

/// Convert whole seconds to durations
pub fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|s| Duration::from_secs(*s)).collect()
}
