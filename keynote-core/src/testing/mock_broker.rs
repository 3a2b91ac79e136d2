//! In-memory pub/sub broker for testing
//!
//! Provides a programmable stand-in for a Redis server's keyspace
//! notifications so the listener can be driven without a real server:
//!
//! - numbered databases, selected from the connection URI
//! - `notify-keyspace-events` flags deciding what gets published
//! - keyspace notification published before the keyevent one
//! - pattern subscriptions acknowledged in order with a running count
//! - scripted failures for every transport operation
//! - a record of connects, opened sessions and subscriptions

use super::glob::compile_pattern;
use crate::core::{Message, TransportError, NOTIFICATIONS_SETTING_KEY};
use crate::transport::{Connection, SubscriptionHandle, Transport};
use async_trait::async_trait;
use globset::GlobMatcher;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Outcome of one scripted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Pass,
    Fail,
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
}

impl Script {
    fn push(&mut self, steps: impl IntoIterator<Item = Step>) {
        self.steps.extend(steps);
    }

    /// Consume the next step; an empty script passes
    fn fails(&mut self) -> bool {
        self.steps.pop_front() == Some(Step::Fail)
    }
}

struct SessionEntry {
    id: u64,
    patterns: Vec<(String, GlobMatcher)>,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct BrokerState {
    next_session: u64,
    sessions: Vec<SessionEntry>,
    config: HashMap<String, String>,
    config_log: Vec<(String, String)>,
    connects: u64,
    opens: Vec<Instant>,
    closes: usize,
    subscribe_log: Vec<(u64, String)>,
    connect_faults: Script,
    config_faults: Script,
    open_faults: Script,
    subscribe_faults: Script,
    receive_faults: Script,
}

impl BrokerState {
    fn remove_session(&mut self, id: u64) {
        self.sessions.retain(|entry| entry.id != id);
    }
}

/// Shared in-memory broker; clones refer to the same broker
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker with `notify-keyspace-events` already set, as in `redis.conf`
    pub fn with_notifications(flags: &str) -> Self {
        let broker = Self::new();
        broker
            .state
            .lock()
            .config
            .insert(NOTIFICATIONS_SETTING_KEY.to_string(), flags.to_string());
        broker
    }

    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            broker: self.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Traffic
    // ------------------------------------------------------------------

    /// Emit the notifications for `event` on `key` in database `db`
    pub fn notify(&self, db: u32, event: &str, key: &str) {
        let state = self.state.lock();
        let flags = state
            .config
            .get(NOTIFICATIONS_SETTING_KEY)
            .map(String::as_str)
            .unwrap_or("");
        let Some(class) = event_class(event) else {
            return;
        };
        if !class_enabled(flags, class) {
            return;
        }

        if flags.contains('K') {
            publish_locked(&state, &format!("__keyspace@{}__:{}", db, key), event);
        }
        if flags.contains('E') {
            publish_locked(&state, &format!("__keyevent@{}__:{}", db, event), key);
        }
    }

    pub fn set(&self, db: u32, key: &str) {
        self.notify(db, "set", key);
    }

    pub fn del(&self, db: u32, key: &str) {
        self.notify(db, "del", key);
    }

    pub fn hset(&self, db: u32, key: &str) {
        self.notify(db, "hset", key);
    }

    pub fn expire(&self, db: u32, key: &str) {
        self.notify(db, "expire", key);
    }

    /// Simulate the key reaching its TTL
    pub fn expired(&self, db: u32, key: &str) {
        self.notify(db, "expired", key);
    }

    /// Publish `data` on a concrete channel to every matching pattern
    pub fn publish(&self, channel: &str, data: &str) -> usize {
        let state = self.state.lock();
        publish_locked(&state, channel, data)
    }

    /// Drop every live session, as a server restart would
    ///
    /// Blocked receives fail with [`TransportError::ConnectionLost`].
    pub fn drop_sessions(&self) {
        self.state.lock().sessions.clear();
    }

    // ------------------------------------------------------------------
    // Fault scripting
    // ------------------------------------------------------------------

    pub fn script_connects(&self, steps: impl IntoIterator<Item = Step>) {
        self.state.lock().connect_faults.push(steps);
    }

    pub fn script_config(&self, steps: impl IntoIterator<Item = Step>) {
        self.state.lock().config_faults.push(steps);
    }

    pub fn script_opens(&self, steps: impl IntoIterator<Item = Step>) {
        self.state.lock().open_faults.push(steps);
    }

    pub fn script_subscribes(&self, steps: impl IntoIterator<Item = Step>) {
        self.state.lock().subscribe_faults.push(steps);
    }

    /// Script receive calls; a failing step fails before reading a message
    pub fn script_receives(&self, steps: impl IntoIterator<Item = Step>) {
        self.state.lock().receive_faults.push(steps);
    }

    pub fn fail_connects(&self, count: usize) {
        self.script_connects(std::iter::repeat(Step::Fail).take(count));
    }

    pub fn fail_subscribes(&self, count: usize) {
        self.script_subscribes(std::iter::repeat(Step::Fail).take(count));
    }

    /// Let `skip` subscribes pass, then fail `count`
    pub fn fail_subscribes_after(&self, skip: usize, count: usize) {
        self.script_subscribes(
            std::iter::repeat(Step::Pass)
                .take(skip)
                .chain(std::iter::repeat(Step::Fail).take(count)),
        );
    }

    pub fn fail_receives(&self, count: usize) {
        self.script_receives(std::iter::repeat(Step::Fail).take(count));
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn connect_count(&self) -> u64 {
        self.state.lock().connects
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opens.len()
    }

    /// When each session was opened
    pub fn open_instants(&self) -> Vec<Instant> {
        self.state.lock().opens.clone()
    }

    /// Successful subscriptions as `(session id, pattern)`; ids start at 1
    pub fn subscribe_log(&self) -> Vec<(u64, String)> {
        self.state.lock().subscribe_log.clone()
    }

    /// Sessions released through `close()`, not counting dropped ones
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn config_value(&self, key: &str) -> Option<String> {
        self.state.lock().config.get(key).cloned()
    }

    /// Every successful `CONFIG SET` as `(key, value)`
    pub fn config_log(&self) -> Vec<(String, String)> {
        self.state.lock().config_log.clone()
    }
}

fn publish_locked(state: &BrokerState, channel: &str, data: &str) -> usize {
    let mut delivered = 0;
    for session in &state.sessions {
        for (pattern, matcher) in &session.patterns {
            if matcher.is_match(channel) {
                let message = Message::pattern_message(pattern.as_str(), channel, data);
                if session.tx.send(message).is_ok() {
                    delivered += 1;
                }
            }
        }
    }
    delivered
}

/// Notification class letter of an event
fn event_class(event: &str) -> Option<char> {
    let class = match event {
        "del" | "expire" | "rename_from" | "rename_to" | "persist" | "copy_to" | "move_from"
        | "move_to" | "restore" | "new" => 'g',
        "set" | "setrange" | "incrby" | "incrbyfloat" | "append" => '$',
        "lpush" | "rpush" | "lpop" | "rpop" | "linsert" | "lset" | "lrem" | "ltrim" => 'l',
        "sadd" | "srem" | "spop" | "sinterstore" | "sunionstore" | "sdiffstore" => 's',
        "hset" | "hincrby" | "hincrbyfloat" | "hdel" => 'h',
        "zadd" | "zincr" | "zrem" | "zrembyscore" | "zrembyrank" | "zinterstore"
        | "zunionstore" => 'z',
        "expired" => 'x',
        "evicted" => 'e',
        _ => return None,
    };
    Some(class)
}

fn class_enabled(flags: &str, class: char) -> bool {
    flags.contains(class) || (flags.contains('A') && class != 'n')
}

/// [`Transport`] backed by a [`MemoryBroker`]
#[derive(Clone)]
pub struct MemoryTransport {
    broker: MemoryBroker,
}

#[async_trait]
impl Transport for MemoryTransport {
    type Connection = MemoryConnection;

    async fn connect(&self, uri: &str) -> Result<MemoryConnection, TransportError> {
        let mut state = self.broker.state.lock();
        if state.connect_faults.fails() {
            return Err(TransportError::Refused(format!("cannot connect to {}", uri)));
        }
        state.connects += 1;

        Ok(MemoryConnection {
            broker: self.broker.clone(),
            database: database_from_uri(uri),
        })
    }
}

/// Database index from `redis://host:port/<db>`; a `db` query parameter wins
fn database_from_uri(uri: &str) -> u32 {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    };

    let from_query = query.and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == "db")
            .and_then(|(_, value)| value.parse().ok())
    });

    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    let from_path = after_scheme
        .split_once('/')
        .and_then(|(_, db)| db.trim_end_matches('/').parse().ok());

    from_query.or(from_path).unwrap_or(0)
}

/// Connection to a [`MemoryBroker`]
pub struct MemoryConnection {
    broker: MemoryBroker,
    database: u32,
}

#[async_trait]
impl Connection for MemoryConnection {
    type Subscription = MemorySubscription;

    fn current_database(&self) -> u32 {
        self.database
    }

    async fn push_config(&self, key: &str, value: &str) -> Result<(), TransportError> {
        let mut state = self.broker.state.lock();
        if state.config_faults.fails() {
            return Err(TransportError::Other(format!("CONFIG SET {} rejected", key)));
        }
        state.config.insert(key.to_string(), value.to_string());
        state.config_log.push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn open_subscription(&self) -> Result<MemorySubscription, TransportError> {
        let mut state = self.broker.state.lock();
        if state.open_faults.fails() {
            return Err(TransportError::ConnectionLost(
                "connection reset while opening pubsub".to_string(),
            ));
        }

        state.next_session += 1;
        let id = state.next_session;
        let (tx, rx) = mpsc::unbounded_channel();
        state.sessions.push(SessionEntry {
            id,
            patterns: Vec::new(),
            tx,
        });
        state.opens.push(Instant::now());

        Ok(MemorySubscription {
            id,
            broker: self.broker.clone(),
            rx,
            closed: false,
        })
    }
}

/// Pub/sub handle of a [`MemoryConnection`]
pub struct MemorySubscription {
    id: u64,
    broker: MemoryBroker,
    rx: mpsc::UnboundedReceiver<Message>,
    closed: bool,
}

impl MemorySubscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl SubscriptionHandle for MemorySubscription {
    async fn subscribe(&mut self, pattern: &str) -> Result<(), TransportError> {
        let mut state = self.broker.state.lock();
        if state.subscribe_faults.fails() {
            return Err(TransportError::ConnectionLost("Boom!".to_string()));
        }
        let matcher = compile_pattern(pattern)
            .map_err(|e| TransportError::Other(format!("invalid pattern '{}': {}", pattern, e)))?;

        let id = self.id;
        let Some(entry) = state.sessions.iter_mut().find(|entry| entry.id == id) else {
            return Err(TransportError::ConnectionLost("session closed".to_string()));
        };
        entry.patterns.push((pattern.to_string(), matcher));
        let count = entry.patterns.len() as u64;
        // receiver lives in `self`, so this send cannot fail
        let _ = entry.tx.send(Message::subscribe_ack(pattern, count));
        state.subscribe_log.push((id, pattern.to_string()));
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Message, TransportError> {
        let fails = self.broker.state.lock().receive_faults.fails();
        if fails {
            return Err(TransportError::ConnectionLost("Error while reading".to_string()));
        }
        self.rx
            .recv()
            .await
            .ok_or_else(|| {
                TransportError::ConnectionLost("connection closed by server".to_string())
            })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        {
            let mut state = self.broker.state.lock();
            state.closes += 1;
            state.remove_session(self.id);
        }
        self.rx.close();
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if !self.closed {
            self.broker.state.lock().remove_session(self.id);
        }
    }
}
