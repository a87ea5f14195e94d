//! Outlook `.msg` decoding: Compound File storages to property records.
//!
//! Stream names carry `IIIITTTT` (property ID, type tag); storages named
//! `__attach_*`, `__recip_*` and embedded `__substg1.0_*` storages become
//! child records.

pub mod directory;
pub mod property;
pub mod tags;
pub mod unpack;

use std::io::{Read, Seek};

use cfb::CompoundFile;

use crate::config::DecodeConfig;
use crate::error::Result;
use directory::DirectoryTree;
use property::BuiltinProperties;
use unpack::UnpackedRecord;

/// Read every storage of `comp` and decode it into a record tree.
pub fn read_record<F: Read + Seek>(
    comp: &mut CompoundFile<F>,
    config: &DecodeConfig,
) -> Result<UnpackedRecord> {
    let tree = DirectoryTree::read(comp)?;
    Ok(unpack::unpack(&tree, &BuiltinProperties, config.max_depth))
}
