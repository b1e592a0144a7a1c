pub mod account;
pub mod message;

pub use account::{Account, Domain, ImapConfig};
pub use message::{AttachmentMeta, InboxMessage, MappedMessage};
