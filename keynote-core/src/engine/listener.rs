//! Resilient listener loop
//!
//! # State Diagram
//!
//! ```text
//!     INIT ──ok──> CONNECTING ──> SUBSCRIBING ──ok──> LISTENING ──┐
//!      │               │               │                  │      message:
//!    error           error           error              error    reset count,
//!      │               │               │                  │      dispatch
//!      └───────────────┴───────┬───────┴──────────────────┘      │
//!                              ▼                                 │
//!                           BACKOFF ──wait──> CONNECTING     <───┘
//!
//!     any state ──shutdown──> STOPPED
//! ```
//!
//! INIT runs until it has produced a connection. Retries go back through
//! CONNECTING with the same connection and a fresh session; only a failure
//! to open a session sends the next attempt back to INIT. The database set
//! is frozen and the notification setting pushed on the first successful
//! INIT only. The loop never gives up on its own.

use super::dispatch::Dispatcher;
use super::session::Session;
use crate::core::{ListenerError, NOTIFICATIONS_SETTING_KEY};
use crate::resilience::{ExponentialBackoff, ShutdownSignal};
use crate::subscription::SubscriptionSpec;
use crate::transport::{Connection, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Listener state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Connecting and pushing server configuration
    Init,
    /// Opening a subscription session
    Connecting,
    /// Subscribing every pattern
    Subscribing,
    /// Pulling and dispatching messages
    Listening,
    /// Waiting before the next attempt
    Backoff,
    /// Terminal
    Stopped,
}

/// Listener statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerStats {
    /// Successful connects
    pub connects: u64,
    /// Sessions opened
    pub sessions: u64,
    /// Sessions that subscribed every pattern
    pub subscriptions: u64,
    /// Failed connects
    pub connect_failures: u64,
    /// Failed pushes of the notification setting
    pub config_failures: u64,
    /// Sessions that stopped at a failed pattern subscription
    pub subscribe_failures: u64,
    /// Sessions whose message stream failed
    pub listen_failures: u64,
    /// Messages handed to the dispatcher
    pub messages_dispatched: u64,
    /// Failures since the last received message
    pub consecutive_failures: u32,
    /// Most recent backoff wait
    pub last_delay: Option<Duration>,
}

impl ListenerStats {
    pub fn total_failures(&self) -> u64 {
        self.connect_failures
            + self.config_failures
            + self.subscribe_failures
            + self.listen_failures
    }
}

enum Attempt {
    Stopped,
    Failed(ListenerError),
}

/// State owned by the background task
pub(crate) struct Listener<T: Transport, D: Dispatcher> {
    transport: Arc<T>,
    uri: String,
    spec: SubscriptionSpec,
    dispatcher: Arc<D>,
    shutdown: ShutdownSignal,
    state: Arc<watch::Sender<ListenerState>>,
    stats: Arc<Mutex<ListenerStats>>,
    connection: Option<Arc<T::Connection>>,
    config_pushed: bool,
    backoff: ExponentialBackoff,
}

impl<T: Transport, D: Dispatcher> Listener<T, D> {
    pub(crate) fn new(
        transport: Arc<T>,
        uri: String,
        spec: SubscriptionSpec,
        dispatcher: Arc<D>,
        shutdown: ShutdownSignal,
        state: Arc<watch::Sender<ListenerState>>,
        stats: Arc<Mutex<ListenerStats>>,
    ) -> Self {
        let backoff = ExponentialBackoff::with_factor(spec.backoff_factor());
        Self {
            transport,
            uri,
            spec,
            dispatcher,
            shutdown,
            state,
            stats,
            connection: None,
            config_pushed: false,
            backoff,
        }
    }

    /// Run until shutdown
    pub(crate) async fn run(mut self) {
        info!(uri = %self.uri, "Started listening to Redis keyspace notifications");

        loop {
            let err = match self.attempt().await {
                Attempt::Stopped => break,
                Attempt::Failed(err) => err,
            };

            let delay = self.backoff.next_delay();
            self.record_failure(&err, delay);
            error!(
                error = %err,
                kind = err.kind(),
                failures = self.backoff.failures(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Error while listening for redis keyspace notifications"
            );

            self.set_state(ListenerState::Backoff);
            if self.shutdown.guard(tokio::time::sleep(delay)).await.is_none() {
                break;
            }
        }

        self.connection = None;
        self.set_state(ListenerState::Stopped);
        info!("Stopped listening to Redis keyspace notifications");
    }

    /// One pass from (re)connection to the first failure
    async fn attempt(&mut self) -> Attempt {
        let connection = match self.connection.clone() {
            Some(connection) => connection,
            None => {
                self.set_state(ListenerState::Init);
                let mut shutdown = self.shutdown.clone();
                match shutdown.guard(self.initialize()).await {
                    None => return Attempt::Stopped,
                    Some(Err(err)) => return Attempt::Failed(err),
                    Some(Ok(connection)) => {
                        let connection = Arc::new(connection);
                        self.connection = Some(Arc::clone(&connection));
                        connection
                    }
                }
            }
        };

        self.set_state(ListenerState::Connecting);
        let mut session = match self.shutdown.guard(Session::open(connection.as_ref())).await {
            None => return Attempt::Stopped,
            Some(Err(err)) => {
                // a connection that cannot hand out sessions is replaced on the next attempt
                self.connection = None;
                return Attempt::Failed(err);
            }
            Some(Ok(session)) => session,
        };
        self.stats.lock().sessions += 1;

        self.set_state(ListenerState::Subscribing);
        let patterns = self.spec.patterns();
        match self.shutdown.guard(session.subscribe_all(&patterns)).await {
            None => {
                session.close().await;
                return Attempt::Stopped;
            }
            Some(Err(err)) => {
                session.close().await;
                return Attempt::Failed(err);
            }
            Some(Ok(())) => {}
        }
        self.stats.lock().subscriptions += 1;
        info!(patterns = patterns.len(), "Subscribed to keyspace notification patterns");

        self.set_state(ListenerState::Listening);
        loop {
            match self.shutdown.guard(session.next_message()).await {
                None => {
                    session.close().await;
                    return Attempt::Stopped;
                }
                Some(Err(err)) => {
                    session.close().await;
                    return Attempt::Failed(err);
                }
                Some(Ok(message)) => {
                    self.backoff.reset();
                    {
                        let mut stats = self.stats.lock();
                        stats.messages_dispatched += 1;
                        stats.consecutive_failures = 0;
                    }
                    debug!(
                        kind = message.kind.as_str(),
                        channel = %message.channel,
                        "Dispatching notification"
                    );
                    self.dispatcher.dispatch(message);
                }
            }
        }
    }

    /// Connect, freeze the database set and push the notification setting
    async fn initialize(&mut self) -> Result<T::Connection, ListenerError> {
        let connection = self
            .transport
            .connect(&self.uri)
            .await
            .map_err(ListenerError::Connect)?;
        self.stats.lock().connects += 1;

        let databases = self.spec.freeze_databases(connection.current_database());
        debug!(databases = ?databases, "Resolved databases");

        if !self.config_pushed {
            if let Some(value) = self.spec.notification_events() {
                connection
                    .push_config(NOTIFICATIONS_SETTING_KEY, value)
                    .await
                    .map_err(ListenerError::Config)?;
                info!(value, "Pushed {}", NOTIFICATIONS_SETTING_KEY);
            }
            self.config_pushed = true;
        }

        Ok(connection)
    }

    fn record_failure(&self, err: &ListenerError, delay: Duration) {
        let mut stats = self.stats.lock();
        match err {
            ListenerError::Connect(_) => stats.connect_failures += 1,
            ListenerError::Config(_) => stats.config_failures += 1,
            ListenerError::Subscribe { .. } => stats.subscribe_failures += 1,
            ListenerError::Listen(_) => stats.listen_failures += 1,
        }
        stats.consecutive_failures = self.backoff.failures();
        stats.last_delay = Some(delay);
    }

    fn set_state(&self, state: ListenerState) {
        self.state.send_replace(state);
    }
}
