pub mod channel;
pub mod user;

pub use channel::{Channel, ChannelKey};
pub use user::{ChannelSettings, ChatUser, SharedUser};
