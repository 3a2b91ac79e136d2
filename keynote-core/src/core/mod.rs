//! Core value types shared by every layer
//!
//! - `types`: notification categories, databases, messages and channel names
//! - `errors`: configuration, transport and listener errors

pub mod errors;
pub mod types;

pub use errors::{ConfigurationError, ListenerError, TransportError};
pub use types::{
    Category, ChannelInfo, Database, Message, MessageKind, Payload, NOTIFICATIONS_SETTING_KEY,
    PMESSAGE_TYPE, PSUBSCRIBE_TYPE,
};
