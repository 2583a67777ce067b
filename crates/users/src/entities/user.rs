use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::channel::ChannelKey;

/// Per-channel preferences a player carries on every server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Player has hidden this channel.
    pub ignoring: bool,
    /// Player sees this channel's traffic even without being a member.
    pub spying: bool,
    /// Override color as a hex string, e.g. `#7f00ff`.
    pub color: Option<String>,
}

/// A player's chat state as held in memory on one process.
///
/// The record is owned by the user directory; the sync layer only reads and
/// mutates fields on instances it resolves. All mutators are plain field
/// assignments so that every synchronized field stays last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct ChatUser {
    pub uuid: Uuid,
    pub nickname: Option<String>,
    pub muted: bool,
    pub shadow_muted: bool,
    pub spying_whispers: bool,
    pub reply_target: Option<Uuid>,
    pub selected_channel: Option<ChannelKey>,
    ignored: HashSet<Uuid>,
    channel_settings: HashMap<ChannelKey, ChannelSettings>,
}

/// One lock per record serializes local command handling against remote
/// applies for the same player. Different players never contend.
pub type SharedUser = Arc<RwLock<ChatUser>>;

impl ChatUser {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            ..Self::default()
        }
    }

    pub fn set_nickname(&mut self, nickname: Option<String>) {
        self.nickname = nickname;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn set_shadow_muted(&mut self, shadow_muted: bool) {
        self.shadow_muted = shadow_muted;
    }

    pub fn set_spying_whispers(&mut self, spying: bool) {
        self.spying_whispers = spying;
    }

    pub fn set_reply_target(&mut self, target: Option<Uuid>) {
        self.reply_target = target;
    }

    pub fn set_selected_channel(&mut self, channel: Option<ChannelKey>) {
        self.selected_channel = channel;
    }

    pub fn set_ignoring_user(&mut self, target: Uuid, ignoring: bool) {
        if ignoring {
            self.ignored.insert(target);
        } else {
            self.ignored.remove(&target);
        }
    }

    pub fn is_ignoring(&self, target: Uuid) -> bool {
        self.ignored.contains(&target)
    }

    pub fn ignored_users(&self) -> impl Iterator<Item = &Uuid> {
        self.ignored.iter()
    }

    pub fn channel_settings(&self, key: &ChannelKey) -> Option<&ChannelSettings> {
        self.channel_settings.get(key)
    }

    /// Settings records are created lazily the first time a channel is
    /// customized, matching how they are persisted.
    pub fn channel_settings_mut(&mut self, key: &ChannelKey) -> &mut ChannelSettings {
        self.channel_settings.entry(key.clone()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_set_adds_and_removes() {
        let mut user = ChatUser::new(Uuid::new_v4());
        let target = Uuid::new_v4();

        assert!(!user.is_ignoring(target));
        user.set_ignoring_user(target, true);
        assert!(user.is_ignoring(target));
        user.set_ignoring_user(target, false);
        assert!(!user.is_ignoring(target));
    }

    #[test]
    fn channel_settings_created_on_first_access() {
        let mut user = ChatUser::new(Uuid::new_v4());
        let key = ChannelKey::from("global");

        assert!(user.channel_settings(&key).is_none());
        user.channel_settings_mut(&key).spying = true;
        assert!(user.channel_settings(&key).unwrap().spying);
        assert!(!user.channel_settings(&key).unwrap().ignoring);
    }

    #[test]
    fn color_override_can_be_cleared() {
        let mut user = ChatUser::new(Uuid::new_v4());
        let key = ChannelKey::from("staff");

        user.channel_settings_mut(&key).color = Some("#ff00ff".into());
        assert_eq!(
            user.channel_settings(&key).unwrap().color.as_deref(),
            Some("#ff00ff")
        );
        user.channel_settings_mut(&key).color = None;
        assert!(user.channel_settings(&key).unwrap().color.is_none());
    }
}
