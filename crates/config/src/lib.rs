use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "partyline.toml",
    "config/partyline.toml",
    "crates/config/partyline.toml",
    "../partyline.toml",
    "../config/partyline.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub language: LanguageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            messaging: MessagingConfig::default(),
            language: LanguageConfig::default(),
        }
    }
}

/// Which transport carries sync messages to the rest of the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Dedicated pub/sub broker, one topic per deployment.
    Broker,
    /// Proxy-mediated plugin-messaging channel.
    Relay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub transport: TransportKind,
    #[serde(default = "MessagingConfig::default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl MessagingConfig {
    fn default_server_name() -> String {
        "server".to_string()
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Broker,
            server_name: Self::default_server_name(),
            broker: BrokerConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "BrokerConfig::default_address")]
    pub address: String,
    /// Password applied on top of the address when the broker requires auth.
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default = "BrokerConfig::default_topic")]
    pub topic: String,
    #[serde(default = "BrokerConfig::default_reconnect_initial")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "BrokerConfig::default_reconnect_max")]
    pub reconnect_max_ms: u64,
}

impl BrokerConfig {
    fn default_address() -> String {
        "redis://127.0.0.1:6379".to_string()
    }

    fn default_topic() -> String {
        "partyline:sync".to_string()
    }

    const fn default_reconnect_initial() -> u64 {
        500
    }

    const fn default_reconnect_max() -> u64 {
        30_000
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            credentials: None,
            topic: Self::default_topic(),
            reconnect_initial_ms: Self::default_reconnect_initial(),
            reconnect_max_ms: Self::default_reconnect_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "RelayConfig::default_channel_name")]
    pub channel_name: String,
}

impl RelayConfig {
    fn default_channel_name() -> String {
        "partyline:sync".to_string()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_name: Self::default_channel_name(),
        }
    }
}

/// Notices shown to a player when another server changes their state.
/// `{nickname}` is substituted in `nickname_set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "LanguageConfig::default_nickname_set")]
    pub nickname_set: String,
    #[serde(default = "LanguageConfig::default_nickname_reset")]
    pub nickname_reset: String,
}

impl LanguageConfig {
    fn default_nickname_set() -> String {
        "Your nickname is now {nickname}.".to_string()
    }

    fn default_nickname_reset() -> String {
        "Your nickname has been reset.".to_string()
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            nickname_set: Self::default_nickname_set(),
            nickname_reset: Self::default_nickname_reset(),
        }
    }
}

impl AppConfig {
    /// Startup validation. A process that cannot join the fleet must not
    /// come up at all, so a bad transport selection is fatal here rather
    /// than a runtime warning.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.messaging.transport {
            TransportKind::Broker => {
                if self.messaging.broker.address.trim().is_empty() {
                    anyhow::bail!("messaging.broker.address is required for the broker transport");
                }
            }
            TransportKind::Relay => {
                if self.messaging.relay.channel_name.trim().is_empty() {
                    anyhow::bail!("messaging.relay.channel_name is required for the relay transport");
                }
            }
        }
        Ok(())
    }
}

/// Load the configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use partyline_config::load;
///
/// std::env::remove_var("PARTYLINE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.messaging.broker.topic.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("messaging.transport", "broker")
        .unwrap()
        .set_default(
            "messaging.server_name",
            defaults.messaging.server_name.clone(),
        )
        .unwrap()
        .set_default(
            "messaging.broker.address",
            defaults.messaging.broker.address.clone(),
        )
        .unwrap()
        .set_default(
            "messaging.broker.topic",
            defaults.messaging.broker.topic.clone(),
        )
        .unwrap()
        .set_default(
            "messaging.broker.reconnect_initial_ms",
            i64::try_from(defaults.messaging.broker.reconnect_initial_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "messaging.broker.reconnect_max_ms",
            i64::try_from(defaults.messaging.broker.reconnect_max_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "messaging.relay.channel_name",
            defaults.messaging.relay.channel_name.clone(),
        )
        .unwrap()
        .set_default("language.nickname_set", defaults.language.nickname_set.clone())
        .unwrap()
        .set_default(
            "language.nickname_reset",
            defaults.language.nickname_reset.clone(),
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("PARTYLINE").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PARTYLINE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PARTYLINE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    config.validate()?;

    debug!(?config, "loaded messaging configuration");
    Ok(config)
}
