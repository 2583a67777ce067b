//! In-memory fan-out fabric, standing in for a broker within one process.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::envelope::Frame;
use crate::error::MessagingError;
use crate::registry::MessageRegistry;
use crate::transport::Transport;

/// Connects any number of [`LocalTransport`] endpoints the way one broker
/// topic would: every publish reaches every other endpoint, in order.
#[derive(Debug, Clone)]
pub struct LocalFabric {
    sender: broadcast::Sender<Bytes>,
}

impl LocalFabric {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn endpoint(&self) -> LocalTransport {
        LocalTransport {
            process_id: Uuid::new_v4(),
            sender: self.sender.clone(),
            task: Mutex::new(None),
        }
    }
}

impl Default for LocalFabric {
    fn default() -> Self {
        Self::new()
    }
}

/// One simulated process on a [`LocalFabric`].
pub struct LocalTransport {
    process_id: Uuid,
    sender: broadcast::Sender<Bytes>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalTransport {
    pub fn process_id(&self) -> Uuid {
        self.process_id
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn publish(&self, name: &str, payload: Bytes) {
        let frame = match Frame::encode(name, self.process_id, &payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(message_type = name, error = %err, "failed to encode frame, dropping");
                return;
            }
        };
        // Send fails only when no other endpoint is listening, which mirrors
        // a fleet of one: nothing to converge with.
        let _ = self.sender.send(frame);
    }

    async fn start(&self, registry: Arc<MessageRegistry>) -> Result<(), MessagingError> {
        let mut receiver = self.sender.subscribe();
        let process_id = self.process_id;
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(raw) => match Frame::decode(raw) {
                        Ok(frame) => {
                            if frame.origin == process_id {
                                continue;
                            }
                            registry.dispatch(&frame.name, frame.payload).await;
                        }
                        Err(err) => warn!(error = %err, "malformed frame, dropping"),
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "local fabric lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn settle(counter: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "fabric did not settle: expected {expected}, saw {}",
            counter.load(Ordering::SeqCst)
        );
    }

    fn counting_registry(counter: Arc<AtomicUsize>) -> Arc<MessageRegistry> {
        let mut registry = MessageRegistry::new();
        registry
            .register("muted", move |_| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn publish_reaches_other_endpoints_but_not_self() {
        let fabric = LocalFabric::new();
        let first = fabric.endpoint();
        let second = fabric.endpoint();

        let first_seen = Arc::new(AtomicUsize::new(0));
        let second_seen = Arc::new(AtomicUsize::new(0));
        first
            .start(counting_registry(Arc::clone(&first_seen)))
            .await
            .unwrap();
        second
            .start(counting_registry(Arc::clone(&second_seen)))
            .await
            .unwrap();

        first.publish("muted", Bytes::from_static(b"\x01"));
        settle(&second_seen, 1).await;
        assert_eq!(first_seen.load(Ordering::SeqCst), 0);

        first.stop().await;
        second.stop().await;
    }
}
