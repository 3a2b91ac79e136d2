//! Resilience primitives for the listener loop
//!
//! - Exponential backoff between failed attempts
//! - Shutdown signal interrupting any suspension point

pub mod backoff;
pub mod shutdown;

pub use backoff::{backoff_delay, ExponentialBackoff};
pub use shutdown::{ShutdownSignal, ShutdownSwitch};
