//! Runtime wiring: turns a validated configuration plus the host's
//! collaborators into a running sync node.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use partyline_config::{AppConfig, TransportKind};
use partyline_messaging::{
    BrokerOptions, BrokerTransport, MessageRegistry, Notices, RelayLink, RelayTransport,
    Synchronizer, Transport,
};
use partyline_users::{ChannelRegistry, Notifier, UserDirectory};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// A fully wired sync node: transport selected and started, handler catalog
/// installed, synchronizer ready for typed publish calls.
#[derive(Clone)]
pub struct SyncServices {
    pub synchronizer: Arc<Synchronizer>,
    pub transport: Arc<dyn Transport>,
    pub process_id: Uuid,
}

impl SyncServices {
    /// Builds and starts the node. Transport selection errors are fatal: a
    /// process that cannot join the fleet must not come up half-configured.
    ///
    /// `relay_link` is required only when the configuration selects the
    /// relay transport; it is the host-owned plugin-messaging channel.
    pub async fn initialise(
        config: &AppConfig,
        directory: Arc<dyn UserDirectory>,
        channels: Arc<dyn ChannelRegistry>,
        notifier: Arc<dyn Notifier>,
        relay_link: Option<Arc<dyn RelayLink>>,
    ) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let process_id = Uuid::new_v4();
        let messaging = &config.messaging;

        let transport: Arc<dyn Transport> = match messaging.transport {
            TransportKind::Broker => {
                info!(
                    address = %messaging.broker.address,
                    topic = %messaging.broker.topic,
                    "using the broker transport for message forwarding"
                );
                let options = BrokerOptions {
                    address: messaging.broker.address.clone(),
                    credentials: messaging.broker.credentials.clone(),
                    topic: messaging.broker.topic.clone(),
                    reconnect_initial: Duration::from_millis(messaging.broker.reconnect_initial_ms),
                    reconnect_max: Duration::from_millis(messaging.broker.reconnect_max_ms),
                };
                Arc::new(
                    BrokerTransport::new(options, process_id)
                        .context("failed to configure the broker transport")?,
                )
            }
            TransportKind::Relay => {
                info!(
                    channel = %messaging.relay.channel_name,
                    "using the relay transport for message forwarding"
                );
                let link = relay_link.context(
                    "the relay transport is selected but the host provided no relay link",
                )?;
                Arc::new(RelayTransport::new(
                    link,
                    messaging.relay.channel_name.clone(),
                    process_id,
                ))
            }
        };

        let notices = Notices {
            nickname_set: config.language.nickname_set.clone(),
            nickname_reset: config.language.nickname_reset.clone(),
        };

        let synchronizer = Synchronizer::new(
            Arc::clone(&transport),
            directory,
            channels,
            notifier,
            notices,
        );

        let mut registry = MessageRegistry::new();
        synchronizer
            .install(&mut registry)
            .context("failed to register the message handler catalog")?;

        transport
            .start(Arc::new(registry))
            .await
            .context("failed to start the transport")?;

        info!(
            server = %messaging.server_name,
            %process_id,
            "state synchronization started"
        );

        Ok(Self {
            synchronizer,
            transport,
            process_id,
        })
    }

    pub async fn shutdown(&self) {
        self.transport.stop().await;
        info!("state synchronization stopped");
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
