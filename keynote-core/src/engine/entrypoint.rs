//! Lifecycle of the background listener
//!
//! A [`KeyspaceEntrypoint`] owns one listener task at a time. `stop()` asks the
//! task to wind down at its next suspension point and waits for it. `kill()`
//! does the same within [`KILL_GRACE`] and aborts the task past that. Both
//! wait for the task, so once they return no session or connection of the
//! entrypoint is alive. Either may be called any number of times.

use super::dispatch::{Dispatcher, MessageHandler, SpawnDispatcher};
use super::listener::{Listener, ListenerState, ListenerStats};
use crate::config::ServiceConfig;
use crate::core::ConfigurationError;
use crate::resilience::ShutdownSwitch;
use crate::subscription::{SetupOutcome, Subscription, SubscriptionSpec};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long `kill()` lets the listener close its session before aborting it
pub const KILL_GRACE: Duration = Duration::from_millis(250);

struct Running {
    switch: ShutdownSwitch,
    handle: JoinHandle<()>,
}

/// Start/stop surface over the resilient listener loop
pub struct KeyspaceEntrypoint<T: Transport, D: Dispatcher> {
    transport: Arc<T>,
    uri: String,
    spec: SubscriptionSpec,
    dispatcher: Arc<D>,
    state: Arc<watch::Sender<ListenerState>>,
    stats: Arc<Mutex<ListenerStats>>,
    running: Option<Running>,
}

impl<T: Transport, D: Dispatcher> KeyspaceEntrypoint<T, D> {
    pub fn new(
        transport: T,
        uri: impl Into<String>,
        spec: SubscriptionSpec,
        dispatcher: D,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Init);
        Self {
            transport: Arc::new(transport),
            uri: uri.into(),
            spec,
            dispatcher: Arc::new(dispatcher),
            state: Arc::new(state),
            stats: Arc::new(Mutex::new(ListenerStats::default())),
            running: None,
        }
    }

    /// Build from a validated [`Subscription::setup`] result
    pub fn from_setup(transport: T, setup: SetupOutcome, dispatcher: D) -> Self {
        Self::new(transport, setup.uri, setup.spec, dispatcher)
    }

    /// Launch the listener on the current tokio runtime
    ///
    /// Starting an entrypoint whose listener is still running is ignored.
    pub fn start(&mut self) {
        if self.is_running() {
            warn!(uri = %self.uri, "Listener already running, ignoring start");
            return;
        }

        let switch = ShutdownSwitch::new();
        let listener = Listener::new(
            Arc::clone(&self.transport),
            self.uri.clone(),
            self.spec.clone(),
            Arc::clone(&self.dispatcher),
            switch.signal(),
            Arc::clone(&self.state),
            Arc::clone(&self.stats),
        );
        let handle = tokio::spawn(listener.run());
        self.running = Some(Running { switch, handle });
    }

    /// Cooperative stop; returns once the listener has exited
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.switch.shutdown("stop requested");
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Listener task did not exit cleanly");
            self.mark_stopped();
        }
    }

    /// Stop within [`KILL_GRACE`], aborting the task if it is still running
    ///
    /// An aborted task skips `close()` on its session; the handle is dropped.
    pub async fn kill(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        running.switch.shutdown("kill requested");
        let joined = match tokio::time::timeout(KILL_GRACE, &mut running.handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(grace = ?KILL_GRACE, "Listener still running, aborting");
                running.handle.abort();
                running.handle.await
            }
        };
        match joined {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => self.mark_stopped(),
            Err(e) => {
                warn!(error = %e, "Listener task did not exit cleanly");
                self.mark_stopped();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Receiver observing every state transition
    pub fn state_watch(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> ListenerStats {
        self.stats.lock().clone()
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Interests as configured; databases resolved at connect time live in the task
    pub fn spec(&self) -> &SubscriptionSpec {
        &self.spec
    }

    /// Listener exit that skipped its own teardown
    fn mark_stopped(&self) {
        self.state.send_replace(ListenerState::Stopped);
        info!("Stopped listening to Redis keyspace notifications");
    }
}

impl<T: Transport, D: Dispatcher> Drop for KeyspaceEntrypoint<T, D> {
    // the detached task closes its session and exits on its own
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.switch.shutdown("entrypoint dropped");
        }
    }
}

impl Subscription {
    /// Validate against `config` and wire `handler` to a new entrypoint
    pub fn bind<T, H>(
        &self,
        config: &ServiceConfig,
        transport: T,
        handler: H,
    ) -> Result<KeyspaceEntrypoint<T, SpawnDispatcher<H>>, ConfigurationError>
    where
        T: Transport,
        H: MessageHandler,
    {
        let setup = self.setup(config)?;
        Ok(KeyspaceEntrypoint::from_setup(
            transport,
            setup,
            SpawnDispatcher::new(handler),
        ))
    }
}
