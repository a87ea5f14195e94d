//! `Content-Transfer-Encoding` body filters.
//!
//! Both decoders are lenient: garbage is skipped or kept literally, never an
//! error, since a partially damaged attachment is still worth extracting.

use base64::Engine;

use crate::parser::charset::{hex_val, LENIENT_BASE64};

/// A declared transfer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// `7bit`, `8bit`, `binary`, or anything unrecognized.
    Identity,
    QuotedPrintable,
    Base64,
}

impl TransferEncoding {
    /// Classify a `Content-Transfer-Encoding` value (case-insensitive).
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("quoted-printable") => Self::QuotedPrintable,
            Some("base64") => Self::Base64,
            _ => Self::Identity,
        }
    }

    pub fn decode(self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Identity => body.to_vec(),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::Base64 => decode_base64(body),
        }
    }
}

/// Decode base64, ignoring every byte outside the alphabet.
///
/// A dangling single character (not a whole byte) is dropped.
pub fn decode_base64(body: &[u8]) -> Vec<u8> {
    let mut cleaned: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }
    match LENIENT_BASE64.decode(&cleaned) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable base64 body, keeping raw bytes");
            body.to_vec()
        }
    }
}

/// Decode quoted-printable (RFC 2045 §6.7).
///
/// Soft line breaks are removed, trailing whitespace before a line break is
/// dropped, and invalid `=` escapes are kept as-is.
pub fn decode_quoted_printable(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    for line in body.split_inclusive(|&b| b == b'\n') {
        let (content, eol): (&[u8], &[u8]) = if let Some(c) = line.strip_suffix(b"\r\n") {
            (c, b"\r\n")
        } else if let Some(c) = line.strip_suffix(b"\n") {
            (c, b"\n")
        } else {
            (line, b"")
        };
        let content = trim_end_ws(content);

        let (content, soft_break) = match content.strip_suffix(b"=") {
            Some(c) => (c, true),
            None => (content, false),
        };

        decode_qp_segment(content, &mut out);
        if !soft_break {
            out.extend_from_slice(eol);
        }
    }

    out
}

fn decode_qp_segment(content: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < content.len() {
        if content[i] == b'=' && i + 2 < content.len() {
            if let (Some(hi), Some(lo)) = (hex_val(content[i + 1]), hex_val(content[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(content[i]);
        i += 1;
    }
}

fn trim_end_ws(mut s: &[u8]) -> &[u8] {
    while let [rest @ .., b' ' | b'\t'] = s {
        s = rest;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header() {
        assert_eq!(
            TransferEncoding::from_header(Some(" Base64 ")),
            TransferEncoding::Base64
        );
        assert_eq!(
            TransferEncoding::from_header(Some("QUOTED-PRINTABLE")),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::from_header(Some("8bit")), TransferEncoding::Identity);
        assert_eq!(TransferEncoding::from_header(None), TransferEncoding::Identity);
    }

    #[test]
    fn test_base64_wrapped_lines() {
        assert_eq!(decode_base64(b"SGVs\r\nbG8g\r\nd29y\nbGQ=\r\n"), b"Hello world");
    }

    #[test]
    fn test_base64_missing_padding_and_garbage() {
        assert_eq!(decode_base64(b"aGk"), b"hi");
        assert_eq!(decode_base64(b"aG*k=\x00"), b"hi");
        assert_eq!(decode_base64(b"aGkx\nQ"), b"hi1");
    }

    #[test]
    fn test_qp_soft_breaks_and_escapes() {
        let input = b"caf=C3=A9 long =\r\nline\r\nnext=3Dvalue  \r\n";
        assert_eq!(
            decode_quoted_printable(input),
            "café long line\r\nnext=value\r\n".as_bytes()
        );
    }

    #[test]
    fn test_qp_invalid_escape_kept() {
        assert_eq!(decode_quoted_printable(b"100=% sure =Z"), b"100=% sure =Z");
        assert_eq!(decode_quoted_printable(b"a=4"), b"a=4");
    }

    #[test]
    fn test_qp_lowercase_hex() {
        assert_eq!(decode_quoted_printable(b"=e2=82=ac"), "€".as_bytes());
    }
}
