//! Channel registry: resolves channel keys known to this process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{Channel, ChannelKey};

/// Looks a channel key up against the channels configured on this process.
///
/// A miss is normal, not an error: under rolling upgrades or per-server
/// channel configs, another server may reference a channel this one has
/// never heard of.
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    async fn lookup(&self, key: &ChannelKey) -> Option<Channel>;
}

/// In-memory registry for tests and standalone deployments.
#[derive(Debug, Default)]
pub struct MemoryChannelRegistry {
    channels: RwLock<HashMap<ChannelKey, Channel>>,
}

impl MemoryChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, channel: Channel) {
        self.channels
            .write()
            .await
            .insert(channel.key.clone(), channel);
    }

    pub async fn add_member(&self, key: &ChannelKey, member: Uuid) {
        if let Some(channel) = self.channels.write().await.get_mut(key) {
            channel.members.insert(member);
        }
    }
}

#[async_trait]
impl ChannelRegistry for MemoryChannelRegistry {
    async fn lookup(&self, key: &ChannelKey) -> Option<Channel> {
        self.channels.read().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_misses_for_unknown_keys() {
        let registry = MemoryChannelRegistry::new();
        assert!(registry.lookup(&ChannelKey::from("global")).await.is_none());
    }

    #[tokio::test]
    async fn registered_channels_resolve_with_members() {
        let registry = MemoryChannelRegistry::new();
        let key = ChannelKey::from("global");
        let member = Uuid::new_v4();

        registry.register(Channel::new(key.clone())).await;
        registry.add_member(&key, member).await;

        let channel = registry.lookup(&key).await.unwrap();
        assert!(channel.members.contains(&member));
    }
}
