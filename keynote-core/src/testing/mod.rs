//! Testing utilities for unit and integration tests
//!
//! Provides an in-memory broker standing in for a Redis server:
//! - `MemoryBroker`: keyspace notifications, fault scripting, call records
//! - `glob_match`: Redis channel pattern matching
//! - helpers for collecting dispatched messages

pub mod glob;
pub mod helpers;
pub mod mock_broker;

pub use glob::{compile_pattern, glob_match};
pub use helpers::*;
pub use mock_broker::{MemoryBroker, MemoryConnection, MemorySubscription, MemoryTransport, Step};
