pub mod channels;
pub mod directory;
pub mod notify;

pub use channels::{ChannelRegistry, MemoryChannelRegistry};
pub use directory::{MemoryUserDirectory, UserDirectory};
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
