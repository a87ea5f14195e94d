//! `mailfile` decodes RFC 822/MIME messages and Outlook `.msg` containers
//! into one canonical [`Message`](model::Message) tree.
//!
//! The text path ([`parser::mime`]) and the binary path ([`parser::msg`])
//! each produce their own intermediate tree; [`unify`] turns either into a
//! `Message`. [`search::password`] scans the result for announced passwords.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod search;
pub mod unify;

pub use error::{MailError, Result};
pub use model::Message;
pub use parser::{parse_bytes, parse_eml, parse_msg, parse_path, parse_path_with_passwords};
