//! State synchronizer: the per-process façade over the message fabric.
//!
//! Application code calls the typed operations below when a player changes
//! their own state; the operation applies the change to the local record
//! and, for local-origin calls only, publishes it to the fleet. The same
//! operations back the inbound handler catalog, invoked with
//! [`Origin::Remote`] so an applied event can never bounce back out.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tracing::debug;
use uuid::Uuid;

use partyline_codec::{PayloadReader, PayloadWriter};
use partyline_users::{ChannelKey, ChannelRegistry, ChatUser, Notifier, SharedUser, UserDirectory};

use crate::error::MessagingError;
use crate::registry::MessageRegistry;
use crate::transport::Transport;

/// Message-type names shared by every process version. The set is
/// additive-only: a payload layout behind an existing name must never
/// change incompatibly, or the fleet silently desynchronizes.
pub mod names {
    pub const NICKNAME: &str = "nickname";
    pub const NICKNAME_RESET: &str = "nickname-reset";
    pub const SELECTED_CHANNEL: &str = "selected-channel";
    pub const SPYING_WHISPERS: &str = "spying-whispers";
    pub const MUTED: &str = "muted";
    pub const SHADOW_MUTED: &str = "shadow-muted";
    pub const REPLY_TARGET: &str = "reply-target";
    pub const IGNORING_USER: &str = "ignoring-user";
    pub const IGNORING_CHANNEL: &str = "ignoring-channel";
    pub const SPYING_CHANNEL: &str = "spying-channel";
    pub const CHANNEL_COLOR: &str = "channel-color";
    pub const CHANNEL_COLOR_RESET: &str = "channel-color-reset";
    pub const CHANNEL_COMPONENT: &str = "channel-component";
    pub const WHISPER_COMPONENT: &str = "whisper-component";
}

/// Where a mutation came from.
///
/// Every typed operation requires this explicitly. Only `Local` mutations
/// publish; a `Remote` apply never does. Threading the origin through as a
/// mandatory parameter is the sole mechanism preventing infinite
/// rebroadcast across the fleet, so forgetting it must be impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

impl Origin {
    pub fn is_local(self) -> bool {
        matches!(self, Origin::Local)
    }
}

/// Player-facing notices for changes that arrive from another server.
#[derive(Debug, Clone)]
pub struct Notices {
    /// `{nickname}` is substituted with the new nickname.
    pub nickname_set: String,
    pub nickname_reset: String,
}

impl Default for Notices {
    fn default() -> Self {
        Self {
            nickname_set: "Your nickname is now {nickname}.".to_string(),
            nickname_reset: "Your nickname has been reset.".to_string(),
        }
    }
}

/// One per process. Offers typed publish operations to the rest of the
/// application and owns the inbound handler catalog.
pub struct Synchronizer {
    transport: Arc<dyn Transport>,
    directory: Arc<dyn UserDirectory>,
    channels: Arc<dyn ChannelRegistry>,
    notifier: Arc<dyn Notifier>,
    notices: Notices,
}

impl Synchronizer {
    pub fn new(
        transport: Arc<dyn Transport>,
        directory: Arc<dyn UserDirectory>,
        channels: Arc<dyn ChannelRegistry>,
        notifier: Arc<dyn Notifier>,
        notices: Notices,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            directory,
            channels,
            notifier,
            notices,
        })
    }

    /// Registers the built-in handler catalog. Must run before the
    /// transport starts; a duplicate name here is a programming error that
    /// fails the process at startup.
    pub fn install(self: &Arc<Self>, registry: &mut MessageRegistry) -> Result<(), MessagingError> {
        type Apply =
            fn(Arc<Synchronizer>, PayloadReader) -> BoxFuture<'static, Result<(), MessagingError>>;

        let catalog: &[(&str, Apply)] = &[
            (names::NICKNAME, |sync, reader| {
                Box::pin(sync.apply_nickname(reader))
            }),
            (names::NICKNAME_RESET, |sync, reader| {
                Box::pin(sync.apply_nickname_reset(reader))
            }),
            (names::SELECTED_CHANNEL, |sync, reader| {
                Box::pin(sync.apply_selected_channel(reader))
            }),
            (names::SPYING_WHISPERS, |sync, reader| {
                Box::pin(sync.apply_spying_whispers(reader))
            }),
            (names::MUTED, |sync, reader| {
                Box::pin(sync.apply_muted(reader))
            }),
            (names::SHADOW_MUTED, |sync, reader| {
                Box::pin(sync.apply_shadow_muted(reader))
            }),
            (names::REPLY_TARGET, |sync, reader| {
                Box::pin(sync.apply_reply_target(reader))
            }),
            (names::IGNORING_USER, |sync, reader| {
                Box::pin(sync.apply_ignoring_user(reader))
            }),
            (names::IGNORING_CHANNEL, |sync, reader| {
                Box::pin(sync.apply_ignoring_channel(reader))
            }),
            (names::SPYING_CHANNEL, |sync, reader| {
                Box::pin(sync.apply_spying_channel(reader))
            }),
            (names::CHANNEL_COLOR, |sync, reader| {
                Box::pin(sync.apply_channel_color(reader))
            }),
            (names::CHANNEL_COLOR_RESET, |sync, reader| {
                Box::pin(sync.apply_channel_color_reset(reader))
            }),
            (names::CHANNEL_COMPONENT, |sync, reader| {
                Box::pin(sync.apply_channel_component(reader))
            }),
            (names::WHISPER_COMPONENT, |sync, reader| {
                Box::pin(sync.apply_whisper_component(reader))
            }),
        ];

        for (name, apply) in catalog {
            let sync = Arc::clone(self);
            let apply = *apply;
            registry.register(name, move |payload: Bytes| {
                apply(Arc::clone(&sync), PayloadReader::new(payload))
            })?;
        }
        Ok(())
    }

    // ---- typed operations -------------------------------------------------

    /// `Some` sets the nickname, `None` clears it.
    pub async fn set_nickname(
        &self,
        user: Uuid,
        nickname: Option<String>,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        record.write().await.set_nickname(nickname.clone());

        if origin.is_local() {
            match nickname {
                Some(nickname) => {
                    let mut payload = payload_for(user);
                    payload.write_str(&nickname)?;
                    self.transport.publish(names::NICKNAME, payload.freeze());
                }
                None => {
                    self.transport
                        .publish(names::NICKNAME_RESET, payload_for(user).freeze());
                }
            }
        }
        Ok(())
    }

    pub async fn set_selected_channel(
        &self,
        user: Uuid,
        channel: ChannelKey,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        record
            .write()
            .await
            .set_selected_channel(Some(channel.clone()));

        if origin.is_local() {
            let mut payload = payload_for(user);
            payload.write_str(channel.as_str())?;
            self.transport
                .publish(names::SELECTED_CHANNEL, payload.freeze());
        }
        Ok(())
    }

    pub async fn set_spying_whispers(
        &self,
        user: Uuid,
        spying: bool,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        self.set_flag(
            user,
            spying,
            origin,
            names::SPYING_WHISPERS,
            ChatUser::set_spying_whispers,
        )
        .await
    }

    pub async fn set_muted(
        &self,
        user: Uuid,
        muted: bool,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        self.set_flag(user, muted, origin, names::MUTED, ChatUser::set_muted)
            .await
    }

    pub async fn set_shadow_muted(
        &self,
        user: Uuid,
        shadow_muted: bool,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        self.set_flag(
            user,
            shadow_muted,
            origin,
            names::SHADOW_MUTED,
            ChatUser::set_shadow_muted,
        )
        .await
    }

    pub async fn set_reply_target(
        &self,
        user: Uuid,
        target: Uuid,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        record.write().await.set_reply_target(Some(target));

        if origin.is_local() {
            let mut payload = payload_for(user);
            payload.write_uuid(target);
            self.transport.publish(names::REPLY_TARGET, payload.freeze());
        }
        Ok(())
    }

    pub async fn set_ignoring_user(
        &self,
        user: Uuid,
        target: Uuid,
        ignoring: bool,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        record.write().await.set_ignoring_user(target, ignoring);

        if origin.is_local() {
            let mut payload = payload_for(user);
            payload.write_uuid(target);
            payload.write_bool(ignoring);
            self.transport.publish(names::IGNORING_USER, payload.freeze());
        }
        Ok(())
    }

    pub async fn set_ignoring_channel(
        &self,
        user: Uuid,
        channel: &ChannelKey,
        ignoring: bool,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        record.write().await.channel_settings_mut(channel).ignoring = ignoring;

        if origin.is_local() {
            let mut payload = payload_for(user);
            payload.write_str(channel.as_str())?;
            payload.write_bool(ignoring);
            self.transport
                .publish(names::IGNORING_CHANNEL, payload.freeze());
        }
        Ok(())
    }

    pub async fn set_spying_channel(
        &self,
        user: Uuid,
        channel: &ChannelKey,
        spying: bool,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        record.write().await.channel_settings_mut(channel).spying = spying;

        if origin.is_local() {
            let mut payload = payload_for(user);
            payload.write_str(channel.as_str())?;
            payload.write_bool(spying);
            self.transport
                .publish(names::SPYING_CHANNEL, payload.freeze());
        }
        Ok(())
    }

    /// `Some` sets a hex color override for the channel, `None` clears it.
    pub async fn set_channel_color(
        &self,
        user: Uuid,
        channel: &ChannelKey,
        color: Option<String>,
        origin: Origin,
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        record.write().await.channel_settings_mut(channel).color = color.clone();

        if origin.is_local() {
            match color {
                Some(color) => {
                    let mut payload = payload_for(user);
                    payload.write_str(channel.as_str())?;
                    payload.write_str(&color)?;
                    self.transport
                        .publish(names::CHANNEL_COLOR, payload.freeze());
                }
                None => {
                    let mut payload = payload_for(user);
                    payload.write_str(channel.as_str())?;
                    self.transport
                        .publish(names::CHANNEL_COLOR_RESET, payload.freeze());
                }
            }
        }
        Ok(())
    }

    /// Relays an already-rendered channel message to the rest of the fleet.
    /// Publish-only: local rendering happened in the caller's chat
    /// pipeline before this is invoked.
    pub async fn send_channel_component(
        &self,
        sender: Uuid,
        channel: &ChannelKey,
        serialized: &str,
    ) -> Result<(), MessagingError> {
        let mut payload = payload_for(sender);
        payload.write_str(channel.as_str())?;
        payload.write_str(serialized)?;
        self.transport
            .publish(names::CHANNEL_COMPONENT, payload.freeze());
        Ok(())
    }

    /// Relays a rendered whisper to whichever server hosts the target.
    pub async fn send_whisper_component(
        &self,
        sender: Uuid,
        target: Uuid,
        serialized: &str,
    ) -> Result<(), MessagingError> {
        let mut payload = payload_for(sender);
        payload.write_uuid(target);
        payload.write_str(serialized)?;
        self.transport
            .publish(names::WHISPER_COMPONENT, payload.freeze());
        Ok(())
    }

    // ---- inbound applies --------------------------------------------------
    //
    // Each handler decodes every field before touching the record, so a
    // malformed payload never leaves a partial mutation behind.

    async fn apply_nickname(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let nickname = reader.read_str()?;
        self.set_nickname(user, Some(nickname.clone()), Origin::Remote)
            .await?;
        let notice = self.notices.nickname_set.replace("{nickname}", &nickname);
        self.notify_if_online(user, &notice).await;
        Ok(())
    }

    async fn apply_nickname_reset(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        self.set_nickname(user, None, Origin::Remote).await?;
        let notice = self.notices.nickname_reset.clone();
        self.notify_if_online(user, &notice).await;
        Ok(())
    }

    async fn apply_selected_channel(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let key = ChannelKey::new(reader.read_str()?);
        let Some(channel) = self.channels.lookup(&key).await else {
            debug!(channel = %key, "selected channel unknown locally, dropping");
            return Ok(());
        };
        self.set_selected_channel(user, channel.key, Origin::Remote)
            .await
    }

    async fn apply_spying_whispers(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let spying = reader.read_bool()?;
        self.set_spying_whispers(user, spying, Origin::Remote).await
    }

    async fn apply_muted(self: Arc<Self>, mut reader: PayloadReader) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let muted = reader.read_bool()?;
        self.set_muted(user, muted, Origin::Remote).await
    }

    async fn apply_shadow_muted(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let shadow_muted = reader.read_bool()?;
        self.set_shadow_muted(user, shadow_muted, Origin::Remote)
            .await
    }

    async fn apply_reply_target(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let target = reader.read_uuid()?;
        self.set_reply_target(user, target, Origin::Remote).await
    }

    async fn apply_ignoring_user(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let target = reader.read_uuid()?;
        let ignoring = reader.read_bool()?;
        self.set_ignoring_user(user, target, ignoring, Origin::Remote)
            .await
    }

    async fn apply_ignoring_channel(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let key = ChannelKey::new(reader.read_str()?);
        let ignoring = reader.read_bool()?;
        let Some(channel) = self.channels.lookup(&key).await else {
            debug!(channel = %key, "channel unknown locally, dropping");
            return Ok(());
        };
        self.set_ignoring_channel(user, &channel.key, ignoring, Origin::Remote)
            .await
    }

    async fn apply_spying_channel(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let key = ChannelKey::new(reader.read_str()?);
        let spying = reader.read_bool()?;
        let Some(channel) = self.channels.lookup(&key).await else {
            debug!(channel = %key, "channel unknown locally, dropping");
            return Ok(());
        };
        self.set_spying_channel(user, &channel.key, spying, Origin::Remote)
            .await
    }

    async fn apply_channel_color(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let key = ChannelKey::new(reader.read_str()?);
        let color = reader.read_str()?;
        let Some(channel) = self.channels.lookup(&key).await else {
            debug!(channel = %key, "channel unknown locally, dropping");
            return Ok(());
        };
        self.set_channel_color(user, &channel.key, Some(color), Origin::Remote)
            .await
    }

    async fn apply_channel_color_reset(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let user = reader.read_uuid()?;
        let key = ChannelKey::new(reader.read_str()?);
        let Some(channel) = self.channels.lookup(&key).await else {
            debug!(channel = %key, "channel unknown locally, dropping");
            return Ok(());
        };
        self.set_channel_color(user, &channel.key, None, Origin::Remote)
            .await
    }

    async fn apply_channel_component(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let _sender = reader.read_uuid()?;
        let key = ChannelKey::new(reader.read_str()?);
        let serialized = reader.read_str()?;
        let Some(channel) = self.channels.lookup(&key).await else {
            debug!(channel = %key, "channel unknown locally, dropping component");
            return Ok(());
        };
        for member in &channel.members {
            self.notifier.deliver(*member, &serialized).await;
        }
        Ok(())
    }

    async fn apply_whisper_component(
        self: Arc<Self>,
        mut reader: PayloadReader,
    ) -> Result<(), MessagingError> {
        let sender = reader.read_uuid()?;
        let target = reader.read_uuid()?;
        let serialized = reader.read_str()?;

        let record = self.resolve(target).await?;
        {
            let mut user = record.write().await;
            if user.is_ignoring(sender) {
                return Ok(());
            }
            // Receiving a whisper makes the sender the reply target, so
            // /reply works no matter which server the whisper crossed.
            user.set_reply_target(Some(sender));
        }

        if self.directory.currently_online(target).await {
            self.notifier.deliver(target, &serialized).await;
        }
        Ok(())
    }

    // ---- helpers ----------------------------------------------------------

    async fn set_flag(
        &self,
        user: Uuid,
        value: bool,
        origin: Origin,
        name: &'static str,
        apply: fn(&mut ChatUser, bool),
    ) -> Result<(), MessagingError> {
        let record = self.resolve(user).await?;
        apply(&mut *record.write().await, value);

        if origin.is_local() {
            let mut payload = payload_for(user);
            payload.write_bool(value);
            self.transport.publish(name, payload.freeze());
        }
        Ok(())
    }

    async fn resolve(&self, user: Uuid) -> Result<SharedUser, MessagingError> {
        self.directory.resolve(user).await.map_err(|err| {
            debug!(%user, error = %err, "user record unresolved");
            MessagingError::UnresolvedTarget
        })
    }

    async fn notify_if_online(&self, user: Uuid, message: &str) {
        if self.directory.currently_online(user).await {
            self.notifier.notice(user, message).await;
        }
    }
}

/// Every user-scoped payload starts with the UUID the event is about (or,
/// for relayed components, the sender).
fn payload_for(user: Uuid) -> PayloadWriter {
    let mut payload = PayloadWriter::new();
    payload.write_uuid(user);
    payload
}
