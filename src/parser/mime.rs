//! RFC 822 / MIME decoding into a raw node tree.
//!
//! Every node carries its header mapping and exactly one body shape:
//! leaf bytes, a multipart container, or one nested message. Transfer
//! encodings are removed while decoding, and the corresponding
//! `Content-Transfer-Encoding` header is dropped so no consumer decodes
//! twice.

use std::ops::Range;

use tracing::{debug, warn};

use crate::config::DecodeConfig;
use crate::error::{MailError, Result};
use crate::model::message::Headers;
use crate::parser::charset::decode_encoded_word_run;
use crate::parser::header::{read_header_block, skip_envelope, MediaType};
use crate::parser::transfer::TransferEncoding;

/// A decoded MIME entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Headers with encoded words resolved.
    pub headers: Headers,
    pub body: RawBody,
}

/// The three mutually exclusive body shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    /// Transfer-decoded payload bytes.
    Leaf(Vec<u8>),
    Multipart(Multipart),
    /// `message/*` payload.
    Nested(Box<RawMessage>),
}

/// A `multipart/*` body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Multipart {
    pub boundary: String,
    /// Bytes before the first delimiter; `None` when empty.
    pub preamble: Option<Vec<u8>>,
    pub parts: Vec<RawMessage>,
    /// Bytes after the close delimiter line, trailing whitespace removed;
    /// `None` when empty.
    pub epilogue: Option<Vec<u8>>,
    /// Contiguous segments covering the whole (transfer-decoded) body.
    pub framing: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Preamble,
    /// A delimiter line, including the line break in front of it.
    Delimiter,
    /// Raw bytes of one part (headers and body).
    Part,
    Epilogue,
    /// Whitespace owned by neither content nor a delimiter.
    Padding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub range: Range<usize>,
}

impl RawMessage {
    /// Parsed `Content-Type`, `None` when absent or malformed.
    pub fn content_type(&self) -> Option<MediaType> {
        self.headers
            .get("Content-Type")
            .and_then(MediaType::parse_content_type)
    }

    /// Parsed `Content-Disposition`, `None` when absent.
    pub fn disposition(&self) -> Option<MediaType> {
        self.headers
            .get("Content-Disposition")
            .and_then(MediaType::parse)
    }

    pub fn leaf(&self) -> Option<&[u8]> {
        match &self.body {
            RawBody::Leaf(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Decode a complete top-level message.
///
/// Fails only when the header block cannot be parsed. Structural problems
/// in the body degrade the root to a leaf holding the raw body.
pub fn parse_message(data: &[u8], config: &DecodeConfig) -> Result<RawMessage> {
    decode_node(skip_envelope(data), 0, config, true)
}

fn decode_node(data: &[u8], depth: usize, config: &DecodeConfig, top: bool) -> Result<RawMessage> {
    let (mut headers, raw_body) = read_header_block(data)?;
    for value in headers.values_mut() {
        if value.contains("=?") {
            *value = decode_encoded_word_run(value);
        }
    }

    let encoding = TransferEncoding::from_header(headers.get("Content-Transfer-Encoding"));
    let body = if encoding == TransferEncoding::Identity {
        raw_body.to_vec()
    } else {
        headers.remove("Content-Transfer-Encoding");
        encoding.decode(raw_body)
    };

    let media = match headers.get("Content-Type") {
        Some(raw) => {
            let parsed = MediaType::parse_content_type(raw);
            if parsed.is_none() {
                warn!(content_type = raw, "Malformed Content-Type, treating as untyped");
            }
            parsed
        }
        None => None,
    };

    let structured = match &media {
        Some(m) if (m.is_multipart() || m.is_message()) && depth >= config.max_depth => {
            warn!(depth, "Nesting limit reached, keeping body as leaf");
            None
        }
        Some(m) if m.is_multipart() => Some(
            m.param("boundary")
                .filter(|b| !b.is_empty())
                .ok_or(MailError::MissingBoundary)
                .and_then(|b| split_multipart(&body, b, depth, config))
                .map(RawBody::Multipart),
        ),
        Some(m) if m.is_message() => Some(
            decode_node(skip_envelope(&body), depth + 1, config, false)
                .map(|nested| RawBody::Nested(Box::new(nested))),
        ),
        _ => None,
    };

    let body = match structured {
        None => RawBody::Leaf(body),
        Some(Ok(structured)) => structured,
        Some(Err(e)) if top => {
            warn!(error = %e, "Undecodable message body, keeping it as a leaf");
            RawBody::Leaf(body)
        }
        Some(Err(e)) => return Err(e),
    };

    Ok(RawMessage { headers, body })
}

/// Split a multipart body on `--boundary` delimiter lines.
fn split_multipart(
    body: &[u8],
    boundary: &str,
    depth: usize,
    config: &DecodeConfig,
) -> Result<Multipart> {
    let delim = format!("--{boundary}").into_bytes();
    let not_found = || MailError::BoundaryNotFound {
        boundary: boundary.to_string(),
    };

    let mut framing = Vec::new();

    // Opening delimiter: may sit anywhere, even mid-line.
    let mut search = 0;
    let (first, mut line) = loop {
        let pos = find(&body[search..], &delim).ok_or_else(not_found)? + search;
        if let Some(line) = delimiter_line(body, pos, delim.len()) {
            break (pos, line);
        }
        search = pos + 1;
    };

    let preamble_end = body[..first]
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    push(&mut framing, SegmentKind::Preamble, 0..preamble_end);
    push(&mut framing, SegmentKind::Padding, preamble_end..first);
    let preamble = (preamble_end > 0).then(|| body[..preamble_end].to_vec());

    let mut parts = Vec::new();
    let mut delimiter_start = first;
    loop {
        push(&mut framing, SegmentKind::Delimiter, delimiter_start..line.end);
        if line.closing {
            break;
        }

        let content_start = line.end;
        let Some((next_start, next_line)) = find_next_delimiter(body, content_start, &delim) else {
            return Err(MailError::UnterminatedMultipart {
                boundary: boundary.to_string(),
            });
        };
        let content_end = next_start;
        push(&mut framing, SegmentKind::Part, content_start..content_end);

        match decode_node(&body[content_start..content_end], depth + 1, config, false) {
            Ok(part) => parts.push(part),
            Err(e) => warn!(error = %e, index = parts.len(), "Dropping undecodable part"),
        }

        delimiter_start = next_start;
        line = next_line;
    }

    let tail = line.end;
    let epilogue_end = body[tail..]
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(tail, |p| tail + p + 1);
    push(&mut framing, SegmentKind::Epilogue, tail..epilogue_end);
    push(&mut framing, SegmentKind::Padding, epilogue_end..body.len());
    let epilogue = (epilogue_end > tail).then(|| body[tail..epilogue_end].to_vec());

    debug!(boundary, parts = parts.len(), "Split multipart body");
    Ok(Multipart {
        boundary: boundary.to_string(),
        preamble,
        parts,
        epilogue,
        framing,
    })
}

struct DelimiterLine {
    /// End of the delimiter line, past its line break.
    end: usize,
    closing: bool,
}

/// Validate a delimiter at `pos`: `--boundary` followed by optional
/// whitespace, or by `--` for the close delimiter, up to the line end.
fn delimiter_line(body: &[u8], pos: usize, delim_len: usize) -> Option<DelimiterLine> {
    let after = pos + delim_len;
    let line_end = body[after..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(body.len(), |p| after + p + 1);
    let rest = &body[after..line_end];

    if rest.starts_with(b"--") {
        return Some(DelimiterLine {
            end: line_end,
            closing: true,
        });
    }
    rest.iter()
        .all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .then_some(DelimiterLine {
            end: line_end,
            closing: false,
        })
}

/// Find the next delimiter line at or after `from`.
///
/// Returns the start of the delimiter segment (the line break in front of
/// the delimiter, or the delimiter itself when the part is empty) and the
/// parsed line.
fn find_next_delimiter(body: &[u8], from: usize, delim: &[u8]) -> Option<(usize, DelimiterLine)> {
    if body[from..].starts_with(delim) {
        if let Some(line) = delimiter_line(body, from, delim.len()) {
            return Some((from, line));
        }
    }

    let mut search = from;
    while let Some(rel) = find(&body[search..], b"\n") {
        let nl = search + rel;
        if body[nl + 1..].starts_with(delim) {
            if let Some(line) = delimiter_line(body, nl + 1, delim.len()) {
                let start = if nl > from && body[nl - 1] == b'\r' {
                    nl - 1
                } else {
                    nl
                };
                return Some((start, line));
            }
        }
        search = nl + 1;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn push(framing: &mut Vec<Segment>, kind: SegmentKind, range: Range<usize>) {
    if !range.is_empty() {
        framing.push(Segment { kind, range });
    }
}
