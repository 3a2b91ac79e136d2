//! Handing received messages to handlers
//!
//! The listener calls [`Dispatcher::dispatch`] once per received message, in
//! receipt order, and never waits for the handler. What happens to a handler
//! failure is the dispatched unit's business.

use crate::core::Message;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Non-blocking delivery of one message
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, message: Message);
}

/// User handler invoked once per message
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: Message) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: Message) -> anyhow::Result<()> {
        (self)(message).await
    }
}

/// Spawns a tokio task per message
///
/// Handlers overlap freely; only the order of spawning follows receipt order.
pub struct SpawnDispatcher<H: MessageHandler> {
    handler: Arc<H>,
}

impl<H: MessageHandler> SpawnDispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl<H: MessageHandler> Clone for SpawnDispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: MessageHandler> Dispatcher for SpawnDispatcher<H> {
    fn dispatch(&self, message: Message) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            let channel = message.channel.clone();
            if let Err(e) = handler.handle(message).await {
                warn!(channel = %channel, error = %e, "Notification handler failed");
            }
        });
    }
}

/// Forward messages into a channel, e.g. to a consumer task
impl Dispatcher for mpsc::UnboundedSender<Message> {
    fn dispatch(&self, message: Message) {
        if self.send(message).is_err() {
            debug!("Dispatch channel closed, dropping message");
        }
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn dispatch(&self, message: Message) {
        (**self).dispatch(message)
    }
}
