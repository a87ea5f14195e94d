//! Searching decoded message text.

pub mod password;
pub mod sunday;

pub use password::PasswordExtractor;
