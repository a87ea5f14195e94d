//! Property type tags (MS-OXCDATA §2.11.1) and property stream names.

/// The type half of a property tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Unspecified,
    Null,
    Integer16,
    Integer32,
    Floating32,
    Floating64,
    Currency,
    FloatingTime,
    ErrorCode,
    Boolean,
    Object,
    Integer64,
    String8,
    String,
    Time,
    Guid,
    ServerId,
    Restriction,
    RuleAction,
    Binary,
    /// `0x1000 | base`: a multi-valued property of the given base type code.
    Multiple(u16),
    Unknown(u16),
}

impl PropertyType {
    pub const MULTIPLE_FLAG: u16 = 0x1000;

    pub fn from_code(code: u16) -> Self {
        match code {
            0x0000 => Self::Unspecified,
            0x0001 => Self::Null,
            0x0002 => Self::Integer16,
            0x0003 => Self::Integer32,
            0x0004 => Self::Floating32,
            0x0005 => Self::Floating64,
            0x0006 => Self::Currency,
            0x0007 => Self::FloatingTime,
            0x000A => Self::ErrorCode,
            0x000B => Self::Boolean,
            0x000D => Self::Object,
            0x0014 => Self::Integer64,
            0x001E => Self::String8,
            0x001F => Self::String,
            0x0040 => Self::Time,
            0x0048 => Self::Guid,
            0x00FB => Self::ServerId,
            0x00FD => Self::Restriction,
            0x00FE => Self::RuleAction,
            0x0102 => Self::Binary,
            c if c & Self::MULTIPLE_FLAG != 0 => Self::Multiple(c & !Self::MULTIPLE_FLAG),
            c => Self::Unknown(c),
        }
    }

    /// Types stored inline in the 8-byte value slot of
    /// `__properties_version1.0` rather than in their own stream.
    pub fn is_fixed_width(self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::Integer16
                | Self::Integer32
                | Self::Floating32
                | Self::Floating64
                | Self::Currency
                | Self::FloatingTime
                | Self::ErrorCode
                | Self::Boolean
                | Self::Integer64
                | Self::Time
        )
    }
}

/// Prefix of every property value stream.
pub const SUBSTG_PREFIX: &str = "__substg1.0_";
pub const ATTACH_PREFIX: &str = "__attach_version1.0_#";
pub const RECIP_PREFIX: &str = "__recip_version1.0_#";
pub const NAMEID_STORAGE: &str = "__nameid_version1.0";
pub const PROPERTIES_STREAM: &str = "__properties_version1.0";

/// A decoded `__substg1.0_IIIITTTT[-NNNNNNNN]` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamName {
    pub id: u16,
    pub ty: PropertyType,
    /// Element index for one value of a multi-valued property.
    pub index: Option<u32>,
}

impl StreamName {
    /// Parse a property stream (or embedded-object storage) name.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(SUBSTG_PREFIX)?;
        let tag = rest.get(..8)?;
        let id = u16::from_str_radix(tag.get(..4)?, 16).ok()?;
        let ty = u16::from_str_radix(tag.get(4..)?, 16).ok()?;
        let index = match rest.get(8..) {
            None | Some("") => None,
            Some(suffix) => Some(u32::from_str_radix(suffix.strip_prefix('-')?, 16).ok()?),
        };
        Some(Self {
            id,
            ty: PropertyType::from_code(ty),
            index,
        })
    }
}
