//! One attempt's subscription session

use crate::core::{ListenerError, Message};
use crate::subscription::Pattern;
use crate::transport::{Connection, SubscriptionHandle};
use tracing::debug;

/// Wraps a single pub/sub handle for the duration of one listener attempt
///
/// Sessions are never reused: after a failure the caller closes it and opens
/// a new one.
pub struct Session<S: SubscriptionHandle> {
    handle: S,
    subscribed: usize,
    closed: bool,
}

impl<S: SubscriptionHandle> Session<S> {
    /// Obtain a fresh handle from `connection`; does not subscribe
    pub async fn open<C>(connection: &C) -> Result<Self, ListenerError>
    where
        C: Connection<Subscription = S>,
    {
        let handle = connection
            .open_subscription()
            .await
            .map_err(ListenerError::Connect)?;

        Ok(Self {
            handle,
            subscribed: 0,
            closed: false,
        })
    }

    /// Subscribe every pattern in order, stopping at the first failure
    ///
    /// Patterns subscribed before the failure stay subscribed; the session
    /// is expected to be abandoned.
    pub async fn subscribe_all(&mut self, patterns: &[Pattern]) -> Result<(), ListenerError> {
        for pattern in patterns {
            let rendered = pattern.to_string();
            self.handle
                .subscribe(&rendered)
                .await
                .map_err(|source| ListenerError::Subscribe {
                    pattern: rendered.clone(),
                    source,
                })?;
            self.subscribed += 1;
            debug!(pattern = %rendered, "Subscribed");
        }
        Ok(())
    }

    /// Pull the next message, suspending until one arrives
    pub async fn next_message(&mut self) -> Result<Message, ListenerError> {
        self.handle.next_message().await.map_err(ListenerError::Listen)
    }

    /// Messages of this session, pulled one at a time
    pub fn messages(&mut self) -> Messages<'_, S> {
        Messages { session: self }
    }

    /// Patterns subscribed successfully in this session
    pub fn subscribed(&self) -> usize {
        self.subscribed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the handle; later calls do nothing
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.handle.close().await;
        debug!(subscribed = self.subscribed, "Session closed");
    }
}

/// Lazy, non-restartable sequence of a session's messages
pub struct Messages<'a, S: SubscriptionHandle> {
    session: &'a mut Session<S>,
}

impl<S: SubscriptionHandle> Messages<'_, S> {
    pub async fn next(&mut self) -> Result<Message, ListenerError> {
        self.session.next_message().await
    }
}
