//! User directory: resolves a UUID to the mutable local record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{ChatUser, SharedUser};
use crate::types::DirectoryError;

/// Resolves players to their mutable chat records.
///
/// `resolve` may suspend: the target of a remote event is not necessarily
/// loaded in memory, and an implementation backed by persistent storage
/// loads the record so the change is visible on the player's next login.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve(&self, uuid: Uuid) -> Result<SharedUser, DirectoryError>;

    async fn currently_online(&self, uuid: Uuid) -> bool;
}

/// In-memory directory. Records are created on first resolve, the same way
/// a persistent store wraps unknown UUIDs into fresh records.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, SharedUser>>,
    online: RwLock<HashSet<Uuid>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_online(&self, uuid: Uuid, online: bool) {
        let mut set = self.online.write().await;
        if online {
            set.insert(uuid);
        } else {
            set.remove(&uuid);
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn resolve(&self, uuid: Uuid) -> Result<SharedUser, DirectoryError> {
        if let Some(user) = self.users.read().await.get(&uuid) {
            return Ok(Arc::clone(user));
        }

        let mut users = self.users.write().await;
        let user = users
            .entry(uuid)
            .or_insert_with(|| Arc::new(RwLock::new(ChatUser::new(uuid))));
        Ok(Arc::clone(user))
    }

    async fn currently_online(&self, uuid: Uuid) -> bool {
        self.online.read().await.contains(&uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_creates_a_record_once() {
        let directory = MemoryUserDirectory::new();
        let uuid = Uuid::new_v4();

        let first = directory.resolve(uuid).await.unwrap();
        first.write().await.set_muted(true);

        let second = directory.resolve(uuid).await.unwrap();
        assert!(second.read().await.muted);
    }

    #[tokio::test]
    async fn online_tracking() {
        let directory = MemoryUserDirectory::new();
        let uuid = Uuid::new_v4();

        assert!(!directory.currently_online(uuid).await);
        directory.set_online(uuid, true).await;
        assert!(directory.currently_online(uuid).await);
        directory.set_online(uuid, false).await;
        assert!(!directory.currently_online(uuid).await);
    }
}
