//! Pub/sub transport seam
//!
//! The listener only depends on these traits. A client library adapter
//! implements them for a real server, [`crate::testing::MemoryBroker`]
//! implements them in memory.

use crate::core::{Message, TransportError};
use async_trait::async_trait;

/// Factory for connections to a pub/sub endpoint
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Connect to `uri`
    async fn connect(&self, uri: &str) -> Result<Self::Connection, TransportError>;
}

/// An established connection
///
/// Shared read-only across listener attempts; every attempt opens its own
/// subscription handle from it.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Subscription: SubscriptionHandle;

    /// Database index the connection is bound to
    fn current_database(&self) -> u32;

    /// Set a server configuration parameter (`CONFIG SET`)
    async fn push_config(&self, key: &str, value: &str) -> Result<(), TransportError>;

    /// Obtain a fresh pub/sub handle; nothing is subscribed yet
    async fn open_subscription(&self) -> Result<Self::Subscription, TransportError>;
}

/// A connection-scoped pub/sub handle
#[async_trait]
pub trait SubscriptionHandle: Send + 'static {
    /// Subscribe one channel pattern (`PSUBSCRIBE`)
    async fn subscribe(&mut self, pattern: &str) -> Result<(), TransportError>;

    /// Wait for the next message
    async fn next_message(&mut self) -> Result<Message, TransportError>;

    /// Release the handle; must tolerate repeated calls
    async fn close(&mut self);
}
