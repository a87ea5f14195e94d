//! Mail file decoding: RFC 822/MIME text files and Outlook `.msg` containers.

pub mod charset;
pub mod header;
pub mod html;
pub mod mime;
pub mod msg;
pub mod transfer;

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use cfb::CompoundFile;

use crate::config::DecodeConfig;
use crate::error::{MailError, Result};
use crate::model::Message;
use crate::search::PasswordExtractor;
use crate::unify;

/// Compound File signature at offset 0 of every `.msg` file.
pub const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Physical format of a mail file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailFormat {
    /// RFC 822 / MIME text (`.eml`).
    Rfc822,
    /// Outlook Compound File (`.msg`).
    CompoundFile,
}

impl MailFormat {
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&CFB_MAGIC) {
            Self::CompoundFile
        } else {
            Self::Rfc822
        }
    }
}

/// Decode an RFC 822 message from a reader positioned at its start.
pub fn parse_eml<R: Read>(mut reader: R, config: &DecodeConfig) -> Result<Message> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    parse_eml_bytes(&data, config)
}

pub fn parse_eml_bytes(data: &[u8], config: &DecodeConfig) -> Result<Message> {
    let raw = mime::parse_message(data, config)?;
    Ok(unify::eml::unify(&raw, config))
}

/// Decode an already-opened Compound File container.
pub fn parse_msg<F: Read + Seek>(comp: &mut CompoundFile<F>, config: &DecodeConfig) -> Result<Message> {
    let record = msg::read_record(comp, config)?;
    Ok(unify::msg::unify(&record, config))
}

/// Decode a mail file held in memory, choosing the path by signature.
pub fn parse_bytes(data: &[u8], config: &DecodeConfig) -> Result<Message> {
    match MailFormat::sniff(data) {
        MailFormat::CompoundFile => {
            let mut comp = msg::directory::open(Cursor::new(data))?;
            parse_msg(&mut comp, config)
        }
        MailFormat::Rfc822 => parse_eml_bytes(data, config),
    }
}

/// Read and decode a mail file from disk.
pub fn parse_path(path: impl AsRef<Path>, config: &DecodeConfig) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MailError::FileNotFound(path.to_path_buf())
        } else {
            MailError::io(path, e)
        }
    })?;
    if data.is_empty() {
        return Err(MailError::UnsupportedFormat(path.to_path_buf()));
    }
    tracing::debug!(path = %path.display(), bytes = data.len(), "Decoding mail file");
    parse_bytes(&data, config)
}

/// [`parse_path`], then fill [`Message::passwords`] across the whole tree
/// when an extractor is given.
pub fn parse_path_with_passwords(
    path: impl AsRef<Path>,
    config: &DecodeConfig,
    extractor: Option<&PasswordExtractor>,
) -> Result<Message> {
    let mut msg = parse_path(path, config)?;
    if let Some(extractor) = extractor {
        msg.collect_passwords(extractor);
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        assert_eq!(MailFormat::sniff(&CFB_MAGIC), MailFormat::CompoundFile);
        assert_eq!(MailFormat::sniff(b"From: a@b\r\n"), MailFormat::Rfc822);
        assert_eq!(MailFormat::sniff(b""), MailFormat::Rfc822);
    }

    #[test]
    fn test_parse_eml_reader() {
        let msg = parse_eml(&b"Subject: hi\r\n\r\nbody"[..], &DecodeConfig::default()).unwrap();
        assert_eq!(msg.subject, "hi");
    }

    #[test]
    fn test_truncated_cfb_is_structural() {
        let mut data = CFB_MAGIC.to_vec();
        data.extend_from_slice(&[0; 16]);
        assert!(matches!(
            parse_bytes(&data, &DecodeConfig::default()),
            Err(MailError::InvalidCompoundFile(_))
        ));
    }

    #[test]
    fn test_parse_path_with_passwords() {
        use crate::config::PasswordConfig;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.eml");
        std::fs::write(&path, "Subject: zip\r\n\r\npassword: s3cr3t!\r\n").unwrap();
        let config = DecodeConfig::default();

        let plain = parse_path_with_passwords(&path, &config, None).unwrap();
        assert!(plain.passwords.is_empty());

        let extractor = PasswordExtractor::new(&PasswordConfig::default()).unwrap();
        let scanned = parse_path_with_passwords(&path, &config, Some(&extractor)).unwrap();
        assert_eq!(scanned.passwords, vec!["s3cr3t!".to_string()]);
    }

    #[test]
    fn test_parse_path_missing() {
        assert!(matches!(
            parse_path("/nonexistent/mail.eml", &DecodeConfig::default()),
            Err(MailError::FileNotFound(_))
        ));
    }
}
