//! Message-type registry and dispatch.

use std::collections::HashMap;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::MessagingError;

type Handler = Box<dyn Fn(Bytes) -> BoxFuture<'static, Result<(), MessagingError>> + Send + Sync>;

/// Maps message-type names to decode-and-apply handlers.
///
/// All registration happens at startup, before the transport starts; the
/// registry is then shared read-only with the transport's inbound path.
#[derive(Default)]
pub struct MessageRegistry {
    handlers: HashMap<String, Handler>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a name twice is a programming error. It is surfaced here
    /// so the process fails at startup instead of silently shadowing a
    /// handler at runtime.
    pub fn register<F>(&mut self, name: &str, handler: F) -> Result<(), MessagingError>
    where
        F: Fn(Bytes) -> BoxFuture<'static, Result<(), MessagingError>> + Send + Sync + 'static,
    {
        if self.handlers.contains_key(name) {
            return Err(MessagingError::DuplicateHandler(name.to_string()));
        }
        self.handlers.insert(name.to_string(), Box::new(handler));
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Invoked by the transport inbound path, in delivery order.
    ///
    /// A name nobody registered is dropped quietly: a newer server may
    /// publish types an older one has never heard of. A failing handler is
    /// logged and dropped too; the event has already taken effect elsewhere
    /// and the next state change supersedes it. Neither case may break the
    /// dispatch loop.
    pub async fn dispatch(&self, name: &str, payload: Bytes) {
        let Some(handler) = self.handlers.get(name) else {
            debug!(
                message_type = name,
                "no handler for message type, dropping"
            );
            return;
        };

        if let Err(err) = handler(payload).await {
            match err {
                MessagingError::UnresolvedTarget => {
                    debug!(message_type = name, "event target unknown locally, dropping");
                }
                err => {
                    warn!(message_type = name, error = %err, "message handler failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_handler(
        counter: Arc<AtomicUsize>,
    ) -> impl Fn(Bytes) -> BoxFuture<'static, Result<(), MessagingError>> {
        move |_payload| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn dispatches_to_the_registered_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = MessageRegistry::new();
        registry
            .register("muted", counting_handler(Arc::clone(&counter)))
            .unwrap();

        registry.dispatch("muted", Bytes::new()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_message_type_is_dropped_silently() {
        let registry = MessageRegistry::new();
        // Must not panic or error.
        registry.dispatch("from-the-future", Bytes::new()).await;
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = MessageRegistry::new();
        registry
            .register("muted", |_| Box::pin(async { Ok(()) }))
            .unwrap();

        let err = registry
            .register("muted", |_| Box::pin(async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, MessagingError::DuplicateHandler(name) if name == "muted"));
    }

    #[tokio::test]
    async fn failing_handler_does_not_poison_later_dispatches() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = MessageRegistry::new();
        registry
            .register("broken", |_| {
                Box::pin(async { Err(MessagingError::UnknownMessageType("boom".into())) })
            })
            .unwrap();
        registry
            .register("muted", counting_handler(Arc::clone(&counter)))
            .unwrap();

        registry.dispatch("broken", Bytes::new()).await;
        registry.dispatch("muted", Bytes::new()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
