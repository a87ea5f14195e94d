//! Export: attachment extraction and JSON rendering.

pub mod attachment;
pub mod json;
