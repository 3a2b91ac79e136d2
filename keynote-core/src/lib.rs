//! Keynote Core - Resilient Redis Keyspace Notification Subscriber
//!
//! Keynote subscribes to Redis keyspace and keyevent notifications on behalf
//! of a host service and hands every received message to a user handler. The
//! listener never gives up: any transport failure is logged, followed by an
//! exponential backoff wait, and the subscription is re-established until the
//! host stops it.
//!
//! ## Architecture
//! - **One background task** per entrypoint, the only place that waits on Redis
//! - **One session per attempt**, never reused after a failure
//! - **Dispatch without waiting**, handlers run as independent tasks
//! - **Cancellable everywhere**, stop interrupts a blocked read or a backoff wait
//!
//! ## Core Modules
//! - `core`: Messages, channel names, databases, errors
//! - `config`: Host configuration (`REDIS_URIS`, `REDIS`)
//! - `subscription`: Interests and the patterns derived from them
//! - `resilience`: Backoff calculator and shutdown signal
//! - `transport`: Traits a Redis client implements
//! - `engine`: Session, listener loop, dispatch and lifecycle
//! - `testing`: In-memory broker
//!
//! ## Usage
//!
//! ```no_run
//! use keynote_core::prelude::*;
//! use keynote_core::testing::MemoryBroker;
//!
//! # async fn run() -> keynote_core::Result<()> {
//! let config = ServiceConfig::from_json_str(
//!     r#"{
//!         "REDIS_URIS": {"CACHE": "redis://localhost:6379/0"},
//!         "REDIS": {"notification_events": "KEA"}
//!     }"#,
//! )?;
//!
//! let broker = MemoryBroker::new();
//! let mut entrypoint = Subscription::new("CACHE")
//!     .events(["set", "del"])
//!     .bind(&config, broker.transport(), |message: Message| async move {
//!         println!("{} {:?}", message.channel, message.data);
//!         Ok::<(), keynote_core::Error>(())
//!     })?;
//!
//! entrypoint.start();
//! // ...
//! entrypoint.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod resilience;
pub mod subscription;
pub mod testing;
pub mod transport;
pub mod utils;

// Re-export core types
pub use core::{
    Category, ChannelInfo, ConfigurationError, Database, ListenerError, Message, MessageKind,
    Payload, TransportError,
};

// Re-export engine types
pub use engine::{
    Dispatcher, KeyspaceEntrypoint, ListenerState, ListenerStats, MessageHandler, SpawnDispatcher,
};

pub use config::ServiceConfig;
pub use subscription::{Subscription, SubscriptionSpec};

// Re-export error types
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    // Core types
    pub use crate::core::{Category, ConfigurationError, Database, Message, MessageKind, Payload};

    // Configuration and interests
    pub use crate::config::ServiceConfig;
    pub use crate::subscription::{Subscription, SubscriptionSpec};

    // Engine
    pub use crate::engine::{
        Dispatcher, KeyspaceEntrypoint, ListenerState, MessageHandler, SpawnDispatcher,
    };

    // Transport
    pub use crate::transport::{Connection, SubscriptionHandle, Transport};

    // Error types
    pub use crate::{Error, Result};
}
