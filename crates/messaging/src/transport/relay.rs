//! Relay transport: proxy-mediated fan-out over plugin messaging.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::envelope::Frame;
use crate::error::MessagingError;
use crate::registry::MessageRegistry;
use crate::transport::Transport;

/// Returned by a relay link that cannot currently reach the proxy.
#[derive(Debug, Error)]
#[error("relay link unavailable: {0}")]
pub struct RelayLinkError(pub String);

/// The plugin-messaging side channel between this server and the proxy.
///
/// The host owns the connection lifecycle; `send` must hand the frame off
/// without blocking and report unavailability as an error.
pub trait RelayLink: Send + Sync {
    fn send(&self, channel: &str, frame: &[u8]) -> Result<(), RelayLinkError>;
}

/// Transport that never talks to other servers directly: it sends each
/// outbound frame to the coordinating proxy, which forwards it verbatim to
/// every other backend. Inbound frames arrive already fanned out, through
/// [`RelayTransport::handle_frame`].
pub struct RelayTransport {
    link: Arc<dyn RelayLink>,
    channel_name: String,
    process_id: Uuid,
    registry: RwLock<Option<Arc<MessageRegistry>>>,
}

impl RelayTransport {
    pub fn new(link: Arc<dyn RelayLink>, channel_name: impl Into<String>, process_id: Uuid) -> Self {
        Self {
            link,
            channel_name: channel_name.into(),
            process_id,
            registry: RwLock::new(None),
        }
    }

    /// Host glue calls this for every plugin message that arrives from the
    /// proxy. Frames on other channels are ignored. Callers deliver one
    /// frame at a time per connection, which is what preserves per-origin
    /// ordering.
    pub async fn handle_frame(&self, channel: &str, raw: Bytes) {
        if channel != self.channel_name {
            return;
        }

        let registry = self.registry.read().await.clone();
        let Some(registry) = registry else {
            debug!("relay transport not started, dropping inbound frame");
            return;
        };

        match Frame::decode(raw) {
            Ok(frame) => {
                if frame.origin == self.process_id {
                    return;
                }
                registry.dispatch(&frame.name, frame.payload).await;
            }
            Err(err) => warn!(error = %err, "malformed frame, dropping"),
        }
    }
}

#[async_trait]
impl Transport for RelayTransport {
    fn publish(&self, name: &str, payload: Bytes) {
        let frame = match Frame::encode(name, self.process_id, &payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(message_type = name, error = %err, "failed to encode frame, dropping");
                return;
            }
        };

        if let Err(err) = self.link.send(&self.channel_name, &frame) {
            // Routine during proxy restarts; the state this message carried
            // is superseded by the next change.
            debug!(message_type = name, error = %err, "relay link unavailable, dropping publish");
        }
    }

    async fn start(&self, registry: Arc<MessageRegistry>) -> Result<(), MessagingError> {
        *self.registry.write().await = Some(registry);
        Ok(())
    }

    async fn stop(&self) {
        *self.registry.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecLink {
        frames: Mutex<Vec<(String, Vec<u8>)>>,
        down: bool,
    }

    impl RelayLink for VecLink {
        fn send(&self, channel: &str, frame: &[u8]) -> Result<(), RelayLinkError> {
            if self.down {
                return Err(RelayLinkError("proxy not connected".into()));
            }
            self.frames
                .lock()
                .unwrap()
                .push((channel.to_string(), frame.to_vec()));
            Ok(())
        }
    }

    fn counting_registry(counter: Arc<AtomicUsize>) -> MessageRegistry {
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
        registry
    }

    #[tokio::test]
    async fn outbound_frames_go_to_the_configured_channel() {
        let link = Arc::new(VecLink::default());
        let transport = RelayTransport::new(link.clone(), "fleet:chat", Uuid::new_v4());

        transport.publish("muted", Bytes::from_static(b"\x01"));

        let frames = link.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, "fleet:chat");
        let frame = Frame::decode(Bytes::from(frames[0].1.clone())).unwrap();
        assert_eq!(frame.name, "muted");
    }

    #[tokio::test]
    async fn unavailable_link_drops_the_publish_without_error() {
        let link = Arc::new(VecLink {
            down: true,
            ..Default::default()
        });
        let transport = RelayTransport::new(link, "fleet:chat", Uuid::new_v4());
        // Must neither panic nor block.
        transport.publish("muted", Bytes::from_static(b"\x01"));
    }

    #[tokio::test]
    async fn inbound_frames_dispatch_after_start() {
        let counter = Arc::new(AtomicUsize::new(0));
        let transport = RelayTransport::new(
            Arc::new(VecLink::default()),
            "fleet:chat",
            Uuid::new_v4(),
        );
        transport
            .start(Arc::new(counting_registry(Arc::clone(&counter))))
            .await
            .unwrap();

        let frame = Frame::encode("muted", Uuid::new_v4(), b"\x01").unwrap();
        transport.handle_frame("fleet:chat", frame).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn frames_on_other_channels_are_ignored() {
        let counter = Arc::new(AtomicUsize::new(0));
        let transport = RelayTransport::new(
            Arc::new(VecLink::default()),
            "fleet:chat",
            Uuid::new_v4(),
        );
        transport
            .start(Arc::new(counting_registry(Arc::clone(&counter))))
            .await
            .unwrap();

        let frame = Frame::encode("muted", Uuid::new_v4(), b"\x01").unwrap();
        transport.handle_frame("some:other", frame).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn own_frames_are_filtered_out() {
        let counter = Arc::new(AtomicUsize::new(0));
        let process_id = Uuid::new_v4();
        let transport =
            RelayTransport::new(Arc::new(VecLink::default()), "fleet:chat", process_id);
        transport
            .start(Arc::new(counting_registry(Arc::clone(&counter))))
            .await
            .unwrap();

        let frame = Frame::encode("muted", process_id, b"\x01").unwrap();
        transport.handle_frame("fleet:chat", frame).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
