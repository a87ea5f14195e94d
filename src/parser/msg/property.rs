//! Property-ID reference table and per-type value decoding.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::DateTime;

use super::tags::PropertyType;
use crate::parser::charset::{decode_string8, decode_utf16le};

/// Name and default type of a known property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub default_type: PropertyType,
}

/// Read-only lookup from a 16-bit property ID to its name and default type.
///
/// Implementations must be safe for concurrent reads; the decoder never
/// mutates the table.
pub trait PropertyTable {
    fn lookup(&self, id: u16) -> Option<PropertyInfo>;
}

/// The properties needed to build a message.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProperties;

const STRING: u16 = 0x001F;
const BINARY: u16 = 0x0102;
const INT32: u16 = 0x0003;
const BOOL: u16 = 0x000B;
const TIME: u16 = 0x0040;
const OBJECT: u16 = 0x000D;

static BUILTIN: &[(u16, &str, u16)] = &[
    (0x0017, "Importance", INT32),
    (0x001A, "MessageClass", STRING),
    (0x0036, "Sensitivity", INT32),
    (0x0037, "Subject", STRING),
    (0x0039, "ClientSubmitTime", TIME),
    (0x0042, "SentRepresentingName", STRING),
    (0x0050, "ReplyRecipientNames", STRING),
    (0x0070, "ConversationTopic", STRING),
    (0x007D, "TransportMessageHeaders", STRING),
    (0x0C15, "RecipientType", INT32),
    (0x0C1A, "SenderName", STRING),
    (0x0C1F, "SenderEmailAddress", STRING),
    (0x0E02, "DisplayBcc", STRING),
    (0x0E03, "DisplayCc", STRING),
    (0x0E04, "DisplayTo", STRING),
    (0x0E06, "MessageDeliveryTime", TIME),
    (0x0E07, "MessageFlags", INT32),
    (0x0E08, "MessageSize", INT32),
    (0x0E1B, "HasAttachments", BOOL),
    (0x1000, "Body", STRING),
    (0x1009, "RtfCompressed", BINARY),
    (0x1013, "Html", BINARY),
    (0x1035, "InternetMessageId", STRING),
    (0x1039, "InternetReferences", STRING),
    (0x1042, "InReplyToId", STRING),
    (0x3001, "DisplayName", STRING),
    (0x3002, "AddressType", STRING),
    (0x3003, "EmailAddress", STRING),
    (0x3007, "CreationTime", TIME),
    (0x3008, "LastModificationTime", TIME),
    (0x3701, "AttachDataObject", OBJECT),
    (0x3703, "AttachExtension", STRING),
    (0x3704, "AttachFilename", STRING),
    (0x3705, "AttachMethod", INT32),
    (0x3707, "AttachLongFilename", STRING),
    (0x370E, "AttachMimeTag", STRING),
    (0x3712, "AttachContentId", STRING),
    (0x3716, "AttachContentDisposition", STRING),
    (0x39FE, "SmtpAddress", STRING),
    (0x3FDE, "InternetCodepage", INT32),
    (0x3FFD, "MessageCodepage", INT32),
    (0x5D01, "SenderSmtpAddress", STRING),
    (0x5D02, "SentRepresentingSmtpAddress", STRING),
    (0x5D07, "ReceivedBySmtpAddress", STRING),
    (0x5D08, "ReceivedRepresentingSmtpAddress", STRING),
    (0x7FFE, "AttachmentHidden", BOOL),
];

impl PropertyTable for BuiltinProperties {
    fn lookup(&self, id: u16) -> Option<PropertyInfo> {
        BUILTIN
            .binary_search_by_key(&id, |(pid, _, _)| *pid)
            .ok()
            .map(|i| PropertyInfo {
                name: BUILTIN[i].1,
                default_type: PropertyType::from_code(BUILTIN[i].2),
            })
    }
}

/// Name of the property that holds an attachment's literal file content.
pub const ATTACH_DATA: &str = "AttachDataObject";

/// Seconds between 1601-01-01 and 1970-01-01, in 100 ns FILETIME ticks.
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

/// A decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// FILETIME: 100 ns ticks since 1601-01-01 UTC.
    Time(u64),
    String(String),
    Binary(Vec<u8>),
    StringArray(Vec<String>),
    /// Bytes of a type this decoder does not interpret.
    Raw(Vec<u8>),
}

impl PropertyValue {
    /// Decode `data` according to `ty`.
    ///
    /// Fixed-width reads shorter than their type fall back to [`Raw`].
    ///
    /// [`Raw`]: PropertyValue::Raw
    pub fn decode(name: &str, ty: PropertyType, data: &[u8]) -> Self {
        if name == ATTACH_DATA {
            return Self::Binary(data.to_vec());
        }

        let mut rdr = Cursor::new(data);
        let fixed = match ty {
            PropertyType::Null => Some(Self::Null),
            PropertyType::Boolean => data.first().map(|b| Self::Bool(*b != 0)),
            PropertyType::Integer16 => rdr.read_i16::<LittleEndian>().ok().map(Self::Int16),
            PropertyType::Integer32 | PropertyType::ErrorCode => {
                rdr.read_i32::<LittleEndian>().ok().map(Self::Int32)
            }
            PropertyType::Integer64 | PropertyType::Currency => {
                rdr.read_i64::<LittleEndian>().ok().map(Self::Int64)
            }
            PropertyType::Floating32 => rdr.read_f32::<LittleEndian>().ok().map(Self::Float32),
            PropertyType::Floating64 | PropertyType::FloatingTime => {
                rdr.read_f64::<LittleEndian>().ok().map(Self::Float64)
            }
            PropertyType::Time => rdr.read_u64::<LittleEndian>().ok().map(Self::Time),
            PropertyType::String8 => Some(Self::String(decode_string8(data))),
            PropertyType::String => Some(Self::String(decode_utf16le(data))),
            PropertyType::Object => Some(Self::Binary(
                data.iter().copied().filter(|b| *b != 0).collect(),
            )),
            PropertyType::Binary
            | PropertyType::Unspecified
            | PropertyType::Guid
            | PropertyType::Restriction
            | PropertyType::RuleAction
            | PropertyType::ServerId => Some(Self::Binary(data.to_vec())),
            PropertyType::Multiple(base) => Some(decode_multiple(base, data)),
            PropertyType::Unknown(_) => Some(Self::Raw(data.to_vec())),
        };
        fixed.unwrap_or_else(|| Self::Raw(data.to_vec()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) | Self::Raw(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => self.as_i64().map(|v| v != 0),
        }
    }

    /// A FILETIME rendered as an RFC 2822 date.
    pub fn as_rfc2822(&self) -> Option<String> {
        match self {
            Self::Time(ticks) => filetime_to_rfc2822(*ticks),
            _ => None,
        }
    }
}

/// Multi-valued properties: only string arrays are decoded.
fn decode_multiple(base: u16, data: &[u8]) -> PropertyValue {
    match PropertyType::from_code(base) {
        PropertyType::String | PropertyType::String8 => {
            let text: Vec<u8> = data.iter().copied().filter(|b| *b != 0).collect();
            PropertyValue::StringArray(vec![String::from_utf8_lossy(&text).into_owned()])
        }
        _ => PropertyValue::Raw(data.to_vec()),
    }
}

/// Decode one element stream of a multi-valued string property.
pub fn decode_multiple_element(base: u16, data: &[u8]) -> Option<String> {
    match PropertyType::from_code(base) {
        PropertyType::String => Some(decode_utf16le(data)),
        PropertyType::String8 => Some(decode_string8(data)),
        _ => None,
    }
}

pub fn filetime_to_rfc2822(ticks: u64) -> Option<String> {
    let since_epoch = ticks.checked_sub(FILETIME_UNIX_EPOCH)?;
    let secs = i64::try_from(since_epoch / 10_000_000).ok()?;
    let nanos = u32::try_from((since_epoch % 10_000_000) * 100).ok()?;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.to_rfc2822())
}

/// One entry of a `__properties_version1.0` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEntry {
    pub id: u16,
    pub ty: PropertyType,
    pub value: [u8; 8],
}

/// Parse the fixed-size property stream after skipping `header_len` bytes.
///
/// A trailing partial entry is ignored.
pub fn parse_fixed_entries(data: &[u8], header_len: usize) -> Vec<FixedEntry> {
    let Some(body) = data.get(header_len..) else {
        return Vec::new();
    };
    body.chunks_exact(16)
        .filter_map(|chunk| {
            let mut rdr = Cursor::new(chunk);
            let tag = rdr.read_u32::<LittleEndian>().ok()?;
            let _flags = rdr.read_u32::<LittleEndian>().ok()?;
            let mut value = [0u8; 8];
            value.copy_from_slice(chunk.get(8..16)?);
            Some(FixedEntry {
                id: (tag >> 16) as u16,
                ty: PropertyType::from_code((tag & 0xFFFF) as u16),
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_sorted_and_found() {
        assert!(BUILTIN.windows(2).all(|w| w[0].0 < w[1].0));
        let info = BuiltinProperties.lookup(0x0037).unwrap();
        assert_eq!(info.name, "Subject");
        assert_eq!(info.default_type, PropertyType::String);
        assert!(BuiltinProperties.lookup(0x8000).is_none());
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(
            PropertyValue::decode("X", PropertyType::Boolean, &[1, 0]),
            PropertyValue::Bool(true)
        );
        assert_eq!(
            PropertyValue::decode("X", PropertyType::Integer32, &[0xA8, 0x03, 0, 0]),
            PropertyValue::Int32(936)
        );
        assert_eq!(
            PropertyValue::decode("X", PropertyType::Integer16, &[0xFF, 0xFF]),
            PropertyValue::Int16(-1)
        );
        assert_eq!(
            PropertyValue::decode("X", PropertyType::Floating64, &1.5f64.to_le_bytes()),
            PropertyValue::Float64(1.5)
        );
    }

    #[test]
    fn test_short_buffer_is_raw() {
        assert_eq!(
            PropertyValue::decode("X", PropertyType::Integer32, &[1, 2]),
            PropertyValue::Raw(vec![1, 2])
        );
    }

    #[test]
    fn test_decode_strings() {
        let utf16: Vec<u8> = "Hé\0".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(
            PropertyValue::decode("Subject", PropertyType::String, &utf16),
            PropertyValue::String("Hé".into())
        );
        assert_eq!(
            PropertyValue::decode("Subject", PropertyType::String8, b"\xc3\xdc\xc2\xeb\0"),
            PropertyValue::String("密码".into())
        );
    }

    #[test]
    fn test_attach_data_untouched() {
        let data = vec![0u8, 1, 0, 2];
        assert_eq!(
            PropertyValue::decode(ATTACH_DATA, PropertyType::Object, &data),
            PropertyValue::Binary(data.clone())
        );
        assert_eq!(
            PropertyValue::decode("Other", PropertyType::Object, &data),
            PropertyValue::Binary(vec![1, 2])
        );
    }

    #[test]
    fn test_multiple_limited() {
        assert_eq!(
            PropertyValue::decode("X", PropertyType::Multiple(0x001F), b"a\0b\0"),
            PropertyValue::StringArray(vec!["ab".into()])
        );
        assert_eq!(
            PropertyValue::decode("X", PropertyType::Multiple(0x0003), &[1, 0, 0, 0]),
            PropertyValue::Raw(vec![1, 0, 0, 0])
        );
    }

    #[test]
    fn test_filetime() {
        // 2021-01-01T00:00:00Z
        let ticks = FILETIME_UNIX_EPOCH + 1_609_459_200 * 10_000_000;
        let rendered = filetime_to_rfc2822(ticks).unwrap();
        assert!(rendered.starts_with("Fri, "));
        let parsed = DateTime::parse_from_rfc2822(&rendered).unwrap();
        assert_eq!(parsed.timestamp(), 1_609_459_200);
        assert!(filetime_to_rfc2822(0).is_none());
    }

    #[test]
    fn test_fixed_entries() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&0x3FDE_0003u32.to_le_bytes());
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(&[0xA8, 0x03, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[1, 2, 3]);
        let entries = parse_fixed_entries(&data, 8);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 0x3FDE);
        assert_eq!(entries[0].ty, PropertyType::Integer32);
        assert!(parse_fixed_entries(&data, 100).is_empty());
    }
}
