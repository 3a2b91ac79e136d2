//! Subscription interests and the patterns derived from them

pub mod patterns;
pub mod spec;

pub use patterns::{build_patterns, pattern_strings, Pattern};
pub use spec::{SetupOutcome, Subscription, SubscriptionSpec, SubscriptionSpecBuilder};
