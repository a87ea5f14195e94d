//! RFC 5322 header blocks: reading, unfolding, media-type parameters
//! (RFC 2045 / RFC 2231), and tolerant date parsing.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use percent_encoding::percent_decode;
use tracing::{debug, warn};

use crate::error::{MailError, Result};
use crate::model::message::Headers;
use crate::parser::charset;

/// Strip a UTF-8 BOM, an mbox `From ` separator line, and leading blank
/// space in front of a top-level message.
pub fn skip_envelope(data: &[u8]) -> &[u8] {
    let mut data = data.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(data);
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    data = &data[start..];

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Read a header block from the front of `data`.
///
/// Returns the raw (not yet encoded-word decoded) headers and the remaining
/// body bytes. A blank line or end of input ends the block.
pub fn read_header_block(data: &[u8]) -> Result<(Headers, &[u8])> {
    let (block_end, body_start) = find_block_end(data);
    let text = decode_header_bytes(&data[..block_end]);

    let mut headers = Headers::new();
    let mut current: Option<(String, String)> = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            match current.as_mut() {
                Some((_, value)) => {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                None => {
                    return Err(MailError::MalformedHeader {
                        line: line.to_string(),
                    })
                }
            }
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(MailError::MalformedHeader {
                line: line.to_string(),
            });
        };
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(MailError::MalformedHeader {
                line: line.to_string(),
            });
        }

        if let Some((k, v)) = current.take() {
            headers.add(&k, v);
        }
        current = Some((name.to_string(), value.trim().to_string()));
    }
    if let Some((k, v)) = current {
        headers.add(&k, v);
    }

    Ok((headers, &data[body_start.min(data.len())..]))
}

/// Locate the end of the header block.
///
/// Returns `(block_end, body_start)`: the block excludes the terminating
/// blank line, the body starts right after it.
fn find_block_end(data: &[u8]) -> (usize, usize) {
    let mut line_start = 0;
    while line_start < data.len() {
        let line_end = data[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p + 1)
            .unwrap_or(data.len());
        let line = &data[line_start..line_end];
        if line.ends_with(b"\n") && line.iter().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n')) {
            return (line_start, line_end);
        }
        line_start = line_end;
    }
    (data.len(), data.len())
}

/// Decode raw header bytes to text: UTF-8, then GBK, then Windows-1252
/// (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => charset::detect_and_decode_legacy_double_byte(bytes).unwrap_or_else(|| {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }),
    }
}

/// A parsed `Content-Type` or `Content-Disposition` value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaType {
    /// Lower-cased value before the first `;` (`text/plain`, `attachment`).
    pub value: String,
    /// Lower-cased parameter names to decoded values.
    pub params: BTreeMap<String, String>,
}

impl MediaType {
    /// Parse a `Content-Type` value. `None` when the `type/subtype` part is
    /// malformed.
    pub fn parse_content_type(raw: &str) -> Option<Self> {
        let parsed = Self::parse(raw)?;
        let (ty, sub) = parsed.value.split_once('/')?;
        if !is_token(ty) || !is_token(sub) {
            return None;
        }
        Some(parsed)
    }

    /// Parse a `Content-Disposition` style value (`attachment; filename=..`).
    pub fn parse(raw: &str) -> Option<Self> {
        let mut segments = split_params(raw).into_iter();
        let value = segments.next()?.trim().to_ascii_lowercase();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            value,
            params: collect_params(segments),
        })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Top-level type (`multipart` for `multipart/mixed`).
    pub fn main_type(&self) -> &str {
        self.value.split('/').next().unwrap_or(&self.value)
    }

    pub fn is_multipart(&self) -> bool {
        self.main_type() == "multipart"
    }

    pub fn is_message(&self) -> bool {
        self.main_type() == "message"
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b))
}

/// Split on `;` outside quoted strings.
fn split_params(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => out.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    out.push(current);
    out
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Collect parameters, reassembling RFC 2231 continuations and extended
/// values (`name*0*=utf-8''%E2%82`, `name*1*=%AC.txt`).
fn collect_params(segments: impl Iterator<Item = String>) -> BTreeMap<String, String> {
    let mut plain: BTreeMap<String, String> = BTreeMap::new();
    // name -> (section, extended, raw value)
    let mut sections: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            if !segment.trim().is_empty() {
                debug!(param = segment.trim(), "Ignoring parameter without value");
            }
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }

        let (base, extended) = match key.strip_suffix('*') {
            Some(b) => (b.to_string(), true),
            None => (key.clone(), false),
        };
        match base.split_once('*') {
            Some((name, idx)) if idx.bytes().all(|b| b.is_ascii_digit()) && !idx.is_empty() => {
                let section = idx.parse().unwrap_or(0);
                sections
                    .entry(name.to_string())
                    .or_default()
                    .push((section, extended, unquote(value)));
            }
            _ if extended => {
                sections
                    .entry(base)
                    .or_default()
                    .push((0, true, unquote(value)));
            }
            _ => {
                plain.entry(key).or_insert_with(|| unquote(value));
            }
        }
    }

    for (name, mut parts) in sections {
        parts.sort_by_key(|(section, _, _)| *section);
        let mut charset_label = None;
        let mut bytes = Vec::new();
        for (section, extended, value) in parts {
            if extended {
                let mut value = value.as_str();
                if section == 0 {
                    let mut pieces = value.splitn(3, '\'');
                    if let (Some(cs), Some(_lang), Some(rest)) =
                        (pieces.next(), pieces.next(), pieces.next())
                    {
                        charset_label = Some(cs.to_string());
                        value = rest;
                    }
                }
                bytes.extend(percent_decode(value.as_bytes()));
            } else {
                bytes.extend_from_slice(value.as_bytes());
            }
        }
        let decoded = match charset_label.as_deref() {
            Some(cs) if !cs.is_empty() => charset::convert_lossy(&bytes, cs),
            _ => String::from_utf8_lossy(&bytes).into_owned(),
        };
        // Extended values take precedence over a plain fallback of the same name.
        plain.insert(name, decoded);
    }

    plain
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, IMAP `DD-MMM-YYYY`, and named zones.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    const FORMATS: [&str; 10] = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %Z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    let no_dow = strip_day_of_week(trimmed);
    let normalized = normalize_imap_date(no_dow);
    let candidates = [
        no_dow.to_string(),
        normalized.clone(),
        replace_named_tz(no_dow),
        replace_named_tz(&normalized),
    ];

    for candidate in &candidates {
        for fmt in FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Last resort: `mail-parser`'s own date grammar.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    for month in MONTHS {
        for pattern in [
            format!("-{}-", month.to_ascii_uppercase()),
            format!("-{}-", month.to_ascii_lowercase()),
            format!("-{month}-"),
        ] {
            if s.contains(&pattern) {
                return s.replacen(&pattern, &format!(" {month} "), 1);
            }
        }
    }
    s.to_string()
}

/// Strip a leading `"Thu, "` or `"Thu "`.
fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            if let Some(rest) = rest.strip_prefix(',').or_else(|| rest.strip_prefix(' ')) {
                return rest.trim();
            }
        }
    }
    s
}

/// Replace a trailing zone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    const ZONES: [(&str, &str); 13] = [
        ("CEST", "+0200"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    for (name, offset) in ZONES {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

/// Extract content between `<` and `>` (Message-ID, Content-ID).
pub fn strip_angle_brackets(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_header_block_unfolds() {
        let data = b"Subject: This is a long\n\tsubject line\nFrom: user@example.com\n\nBody\n";
        let (headers, body) = read_header_block(data).unwrap();
        assert_eq!(headers.get("subject"), Some("This is a long subject line"));
        assert_eq!(headers.get("From"), Some("user@example.com"));
        assert_eq!(body, b"Body\n");
    }

    #[test]
    fn test_read_header_block_crlf_and_eof() {
        let (headers, body) = read_header_block(b"A: 1\r\nB: 2\r\n\r\nrest").unwrap();
        assert_eq!(headers.get("b"), Some("2"));
        assert_eq!(body, b"rest");

        let (headers, body) = read_header_block(b"A: 1\r\nB: 2").unwrap();
        assert_eq!(headers.len(), 2);
        assert!(body.is_empty());
    }

    #[test]
    fn test_read_header_block_empty_headers() {
        let (headers, body) = read_header_block(b"\r\nJust a body").unwrap();
        assert!(headers.is_empty());
        assert_eq!(body, b"Just a body");
    }

    #[test]
    fn test_read_header_block_whitespace_line_ends_block() {
        let (headers, body) = read_header_block(b"A: 1\n  \nbody").unwrap();
        assert_eq!(headers.get("a"), Some("1"));
        assert_eq!(body, b"body");
    }

    #[test]
    fn test_read_header_block_malformed() {
        let err = read_header_block(b"Subject: ok\nthis is not a header\n\n").unwrap_err();
        assert!(matches!(err, MailError::MalformedHeader { ref line } if line == "this is not a header"));
    }

    #[test]
    fn test_read_header_block_gbk_bytes() {
        let mut data = b"Subject: ".to_vec();
        data.extend_from_slice(&[0xD6, 0xD0, 0xCE, 0xC4]);
        data.extend_from_slice(b"\n\n");
        let (headers, _) = read_header_block(&data).unwrap();
        assert_eq!(headers.get("subject"), Some("中文"));
    }

    #[test]
    fn test_skip_envelope() {
        let data = b"\xEF\xBB\xBFFrom user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_envelope(data).starts_with(b"Subject:"));
        assert_eq!(skip_envelope(b"\r\n  Subject: x\n"), b"Subject: x\n");
        assert_eq!(skip_envelope(b"Subject: Test\n"), b"Subject: Test\n");
    }

    #[test]
    fn test_content_type_params() {
        let ct = MediaType::parse_content_type(
            "Multipart/Mixed; boundary=\"----=_Part_1\"; charset=UTF-8",
        )
        .unwrap();
        assert_eq!(ct.value, "multipart/mixed");
        assert!(ct.is_multipart());
        assert_eq!(ct.param("boundary"), Some("----=_Part_1"));
        assert_eq!(ct.param("charset"), Some("UTF-8"));
    }

    #[test]
    fn test_content_type_malformed() {
        assert!(MediaType::parse_content_type("text").is_none());
        assert!(MediaType::parse_content_type("").is_none());
        assert!(MediaType::parse_content_type("text/ plain").is_none());
    }

    #[test]
    fn test_quoted_param_with_semicolon() {
        let cd = MediaType::parse("attachment; filename=\"a;b \\\"c\\\".txt\"").unwrap();
        assert_eq!(cd.value, "attachment");
        assert_eq!(cd.param("filename"), Some("a;b \"c\".txt"));
    }

    #[test]
    fn test_rfc2231_extended_value() {
        let cd = MediaType::parse("attachment; filename*=utf-8''%E2%82%AC%20rates.txt").unwrap();
        assert_eq!(cd.param("filename"), Some("€ rates.txt"));
    }

    #[test]
    fn test_rfc2231_continuations() {
        let cd = MediaType::parse(
            "attachment; filename*1*=%AC.txt; filename*0*=utf-8'en'%E2%82; filename=\"fallback\"",
        )
        .unwrap();
        assert_eq!(cd.param("filename"), Some("€.txt"));

        let ct = MediaType::parse("application/pdf; name*0=\"long \"; name*1=\"name.pdf\"").unwrap();
        assert_eq!(ct.param("name"), Some("long name.pdf"));
    }

    #[test]
    fn test_strip_angle_brackets() {
        assert_eq!(strip_angle_brackets(" <msg001@example.com> "), "msg001@example.com");
        assert_eq!(strip_angle_brackets("plain"), "plain");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("04 Jan 2024 10:00:00 +0000").is_some());
        assert!(parse_date("Thu, 04 Jan 2024 10:00:00 EST").is_some());
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
        assert!(parse_date("14-AUG-2025 02:01:35 +0000").is_some());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
    }

    #[test]
    fn test_normalize_imap_date() {
        assert_eq!(normalize_imap_date("16-JUL-2025 03:01:03"), "16 Jul 2025 03:01:03");
        assert_eq!(normalize_imap_date("04 Jan 2024 10:00:00"), "04 Jan 2024 10:00:00");
    }
}
