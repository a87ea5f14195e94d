//! Core data model: the canonical message tree, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod message;

pub use address::EmailAddress;
pub use attachment::{Attachment, Embedded};
pub use message::{Headers, Message};
