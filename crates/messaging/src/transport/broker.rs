//! Broker transport: one pub/sub topic shared by the whole fleet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::Frame;
use crate::error::MessagingError;
use crate::registry::MessageRegistry;
use crate::transport::Transport;

/// Connection options for the broker transport.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    pub address: String,
    pub credentials: Option<String>,
    pub topic: String,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

/// Publishes to and subscribes from a single broker topic.
///
/// Publishing goes through a [`ConnectionManager`], which reconnects on its
/// own once established. The subscription runs in a background task that
/// reconnects with exponential backoff; messages published while
/// disconnected are dropped, not queued, since every sync message is
/// superseded by the next state change.
pub struct BrokerTransport {
    client: Client,
    topic: String,
    process_id: Uuid,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    publisher: Arc<RwLock<Option<ConnectionManager>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for BrokerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerTransport")
            .field("topic", &self.topic)
            .field("process_id", &self.process_id)
            .field("reconnect_initial", &self.reconnect_initial)
            .field("reconnect_max", &self.reconnect_max)
            .finish()
    }
}

impl BrokerTransport {
    /// Fails only on an unparseable broker address, which is a startup
    /// configuration error; an unreachable broker is handled by the
    /// reconnect loops instead.
    pub fn new(options: BrokerOptions, process_id: Uuid) -> Result<Self, MessagingError> {
        let mut info = options.address.as_str().into_connection_info().map_err(|err| {
            MessagingError::Configuration(format!("invalid broker address: {err}"))
        })?;
        if let Some(password) = options.credentials {
            info.redis.password = Some(password);
        }
        let client = Client::open(info).map_err(|err| {
            MessagingError::Configuration(format!("invalid broker address: {err}"))
        })?;

        Ok(Self {
            client,
            topic: options.topic,
            process_id,
            reconnect_initial: options.reconnect_initial,
            reconnect_max: options.reconnect_max,
            publisher: Arc::new(RwLock::new(None)),
            tasks: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for BrokerTransport {
    fn publish(&self, name: &str, payload: Bytes) {
        let frame = match Frame::encode(name, self.process_id, &payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(message_type = name, error = %err, "failed to encode frame, dropping");
                return;
            }
        };

        let publisher = Arc::clone(&self.publisher);
        let topic = self.topic.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let connection = publisher.read().await.clone();
            let Some(mut connection) = connection else {
                debug!(message_type = %name, "broker disconnected, dropping publish");
                return;
            };
            if let Err(err) = connection.publish::<_, _, ()>(&topic, frame.to_vec()).await {
                warn!(message_type = %name, error = %err, "broker publish failed, dropping");
            }
        });
    }

    async fn start(&self, registry: Arc<MessageRegistry>) -> Result<(), MessagingError> {
        let initial = self.reconnect_initial;
        let max = self.reconnect_max;

        let publisher_slot = Arc::clone(&self.publisher);
        let client = self.client.clone();
        let connect_task = tokio::spawn(async move {
            let mut delay = initial;
            loop {
                match ConnectionManager::new(client.clone()).await {
                    Ok(manager) => {
                        info!("broker publish connection established");
                        *publisher_slot.write().await = Some(manager);
                        return;
                    }
                    Err(err) => {
                        warn!(error = %err, "broker connection failed, retrying");
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(max);
                    }
                }
            }
        });

        let client = self.client.clone();
        let topic = self.topic.clone();
        let process_id = self.process_id;
        let subscribe_task = tokio::spawn(async move {
            let mut delay = initial;
            loop {
                match client.get_async_pubsub().await {
                    Ok(mut pubsub) => match pubsub.subscribe(&topic).await {
                        Ok(()) => {
                            info!(topic = %topic, "subscribed to broker topic");
                            delay = initial;
                            let mut stream = pubsub.on_message();
                            while let Some(message) = stream.next().await {
                                let raw: Vec<u8> = match message.get_payload() {
                                    Ok(raw) => raw,
                                    Err(err) => {
                                        warn!(error = %err, "unreadable broker message, dropping");
                                        continue;
                                    }
                                };
                                match Frame::decode(Bytes::from(raw)) {
                                    Ok(frame) => {
                                        // Our own publish, echoed back by the topic.
                                        if frame.origin == process_id {
                                            continue;
                                        }
                                        registry.dispatch(&frame.name, frame.payload).await;
                                    }
                                    Err(err) => {
                                        warn!(error = %err, "malformed frame, dropping");
                                    }
                                }
                            }
                            warn!("broker subscription closed, reconnecting");
                        }
                        Err(err) => warn!(error = %err, "broker subscribe failed"),
                    },
                    Err(err) => warn!(error = %err, "broker connection failed"),
                }
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max);
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.push(connect_task);
        tasks.push(subscribe_task);
        Ok(())
    }

    async fn stop(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        *self.publisher.write().await = None;
        info!("broker transport stopped");
    }
}
