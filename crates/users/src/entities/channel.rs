use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

/// Short stable identifier for one communication channel.
///
/// The set of valid keys is owned by the channel registry; the sync layer
/// looks keys up and never invents them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// A channel as known to the local process: its key plus the players
/// currently subscribed to it here.
#[derive(Debug, Clone)]
pub struct Channel {
    pub key: ChannelKey,
    pub members: HashSet<Uuid>,
}

impl Channel {
    pub fn new(key: ChannelKey) -> Self {
        Self {
            key,
            members: HashSet::new(),
        }
    }

    pub fn with_members(key: ChannelKey, members: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            key,
            members: members.into_iter().collect(),
        }
    }
}
