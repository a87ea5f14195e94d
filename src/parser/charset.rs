//! Charset normalization: RFC 2047 encoded words, GBK autodetection, and
//! conversion of named charsets to Unicode.
//!
//! Conversion tries, in order: UTF-8 pass-through, `encoding_rs` (WHATWG
//! labels), then `mail-parser`'s charset table, which knows a few legacy
//! labels WHATWG does not. When nothing accepts the label the caller gets
//! [`CharsetError::Unsupported`] carrying the best partial decode.

use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use tracing::{debug, warn};

use crate::error::CharsetError;

/// Lenient base64 engine: padding optional, trailing bits ignored.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Convert `bytes` declared as `charset` to a `String`.
pub fn convert(bytes: &[u8], charset: &str) -> Result<String, CharsetError> {
    let label = normalize_label(charset);

    if label.is_empty() || label == "utf-8" || label == "utf8" || label == "us-ascii" {
        return Ok(match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => detect_and_decode_legacy_double_byte(bytes)
                .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned()),
        });
    }

    let mut partial = None;
    if let Some(encoding) = encoding_rs::Encoding::for_label_no_replacement(label.as_bytes()) {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(bytes);
        if !had_errors {
            return Ok(decoded.into_owned());
        }
        debug!(charset = %label, "Charset decode had errors, trying next backend");
        partial = Some(decoded.into_owned());
    }

    if let Some(decoder) = mail_parser::decoders::charsets::map::charset_decoder(label.as_bytes())
    {
        return Ok(decoder(bytes));
    }

    let partial = partial.unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned());
    warn!(charset = %label, "No decoder accepted charset");
    Err(CharsetError::Unsupported {
        charset: label,
        partial,
    })
}

/// Like [`convert`], but never fails: the partial decode is used on error.
pub fn convert_lossy(bytes: &[u8], charset: &str) -> String {
    convert(bytes, charset).unwrap_or_else(CharsetError::into_partial)
}

/// Lower-case, unquote, and drop an RFC 2231 language suffix (`utf-8*en`).
fn normalize_label(charset: &str) -> String {
    let label = charset.trim().trim_matches('"');
    let label = label.split('*').next().unwrap_or(label);
    label.to_ascii_lowercase()
}

/// Decode a single `=?charset?enc?text?=` token.
///
/// A malformed token or an unknown `enc` yields the token unchanged. A
/// charset no backend accepts yields an error carrying the partial decode.
pub fn decode_encoded_word(token: &str) -> Result<String, CharsetError> {
    match split_encoded_word(token) {
        Some((charset, bytes, consumed)) if consumed == token.len() - 2 => convert(&bytes, charset),
        _ => Ok(token.to_string()),
    }
}

/// Parse `charset?enc?text?=` following an initial `=?`.
///
/// Returns the charset, the decoded bytes, and how many bytes of `s` were
/// consumed.
fn split_encoded_word(s: &str) -> Option<(&str, Vec<u8>, usize)> {
    let s = s.strip_prefix("=?")?;
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let text_and_tail = &rest[second_q + 1..];
    let end = text_and_tail.find("?=")?;
    let text = &text_and_tail[..end];

    let bytes = match encoding {
        "B" | "b" => decode_b(text)?,
        "Q" | "q" => decode_q(text),
        _ => return None,
    };

    Some((charset, bytes, first_q + 1 + second_q + 1 + end + 2))
}

fn decode_b(text: &str) -> Option<Vec<u8>> {
    let cleaned: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(&cleaned).ok()
}

/// Q encoding (RFC 2047 §4.2): `_` is a space, `=XX` a byte.
fn decode_q(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        result.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

pub(crate) fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode every encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped (RFC 2047 §6.2);
/// all other text is kept verbatim. Text without `=?` comes back unchanged.
pub fn decode_encoded_word_run(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        match split_encoded_word(&remaining[start..]) {
            Some((charset, bytes, consumed)) => {
                result.push_str(&convert_lossy(&bytes, charset));
                remaining = &remaining[start + 2 + consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = &remaining[start + 2..];
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// True when `bytes` is not valid UTF-8 but is entirely well-formed GBK.
///
/// Bytes `<= 0x7F` are ASCII. Every other byte must be a lead byte in
/// `0x81..=0xFE` followed by a trail byte in `0x40..=0xFE`, `0xF7` excluded.
pub fn is_legacy_double_byte(bytes: &[u8]) -> bool {
    if std::str::from_utf8(bytes).is_ok() {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b <= 0x7F {
            i += 1;
            continue;
        }
        if !(0x81..=0xFE).contains(&b) {
            return false;
        }
        match bytes.get(i + 1) {
            Some(&t) if (0x40..=0xFE).contains(&t) && t != 0xF7 => i += 2,
            _ => return false,
        }
    }
    true
}

/// Decode `bytes` as GBK when [`is_legacy_double_byte`] accepts them.
pub fn detect_and_decode_legacy_double_byte(bytes: &[u8]) -> Option<String> {
    if !is_legacy_double_byte(bytes) {
        return None;
    }
    let (decoded, _) = encoding_rs::GBK.decode_without_bom_handling(bytes);
    Some(decoded.into_owned())
}

/// Text payload conversion used for bodies and binary-format strings.
///
/// A declared charset goes through [`convert`]; an undeclared one is kept
/// as-is unless `repair` is set and the bytes look like GBK.
pub fn decode_text(bytes: &[u8], declared: Option<&str>, repair: bool) -> Vec<u8> {
    match declared.map(normalize_label) {
        Some(label) if !label.is_empty() && label != "utf-8" && label != "utf8" => {
            convert_lossy(bytes, &label).into_bytes()
        }
        _ if repair => detect_and_decode_legacy_double_byte(bytes)
            .map(String::into_bytes)
            .unwrap_or_else(|| bytes.to_vec()),
        _ => bytes.to_vec(),
    }
}

/// Decode an 8-bit property string: GB18030, trailing NULs removed.
pub fn decode_string8(bytes: &[u8]) -> String {
    let (decoded, _) = encoding_rs::GB18030.decode_without_bom_handling(bytes);
    decoded.trim_end_matches('\0').to_string()
}

/// Decode a UTF-16LE property string, trailing NULs removed.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let (decoded, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(bytes);
    decoded.trim_end_matches('\0').to_string()
}

/// Charset label for a Windows code page number.
pub fn codepage_label(codepage: i64) -> Option<&'static str> {
    Some(match codepage {
        437 => "ibm437",
        850 => "ibm850",
        866 => "ibm866",
        874 => "windows-874",
        932 => "shift_jis",
        936 => "gbk",
        949 => "euc-kr",
        950 => "big5",
        1200 => "utf-16le",
        1250 => "windows-1250",
        1251 => "windows-1251",
        1252 => "windows-1252",
        1253 => "windows-1253",
        1254 => "windows-1254",
        1255 => "windows-1255",
        1256 => "windows-1256",
        1257 => "windows-1257",
        1258 => "windows-1258",
        20866 => "koi8-r",
        21866 => "koi8-u",
        28591 => "iso-8859-1",
        28592 => "iso-8859-2",
        28595 => "iso-8859-5",
        28597 => "iso-8859-7",
        28605 => "iso-8859-15",
        50220 | 50221 | 50222 => "iso-2022-jp",
        51932 => "euc-jp",
        51949 => "euc-kr",
        52936 => "hz-gb-2312",
        54936 => "gb18030",
        65001 => "utf-8",
        _ => return None,
    })
}
