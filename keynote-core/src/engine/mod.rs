//! Listener engine
//!
//! - `session`: one pub/sub session per attempt
//! - `listener`: the retry-forever state machine
//! - `dispatch`: handing messages to handlers without waiting on them
//! - `entrypoint`: start/stop/kill of the background task

pub mod dispatch;
pub mod entrypoint;
pub mod listener;
pub mod session;

pub use dispatch::{Dispatcher, MessageHandler, SpawnDispatcher};
pub use entrypoint::{KeyspaceEntrypoint, KILL_GRACE};
pub use listener::{ListenerState, ListenerStats};
pub use session::{Messages, Session};
