//! Notification collaborator: delivers text to a player on this process.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// Delivers text to a player. Rich text arrives in its serialized form; the
/// implementation deserializes it into whatever the host renders.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a serialized rich-text component.
    async fn deliver(&self, recipient: Uuid, serialized: &str);

    /// Deliver a plain language notice.
    async fn notice(&self, recipient: Uuid, message: &str);
}

/// Notifier that logs deliveries. Used by the standalone server binary,
/// where there is no player screen to render to.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, recipient: Uuid, serialized: &str) {
        info!(%recipient, component = serialized, "delivering component");
    }

    async fn notice(&self, recipient: Uuid, message: &str) {
        info!(%recipient, message, "delivering notice");
    }
}

/// Notifier that records every delivery, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<(Uuid, String)>>,
    notices: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<(Uuid, String)> {
        self.deliveries.lock().expect("deliveries lock").clone()
    }

    pub fn notices(&self) -> Vec<(Uuid, String)> {
        self.notices.lock().expect("notices lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, recipient: Uuid, serialized: &str) {
        self.deliveries
            .lock()
            .expect("deliveries lock")
            .push((recipient, serialized.to_string()));
    }

    async fn notice(&self, recipient: Uuid, message: &str) {
        self.notices
            .lock()
            .expect("notices lock")
            .push((recipient, message.to_string()));
    }
}
