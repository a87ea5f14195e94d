//! The canonical message tree both decode paths produce.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::address::EmailAddress;
use super::attachment::{Attachment, Embedded};
use crate::parser::header::parse_date;
use crate::search::password::PasswordExtractor;

/// Header mapping with RFC 822 canonical keys and ordered values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form of a header name: first letter and every letter after
    /// a hyphen upper-cased, the rest lower-cased (`content-type` →
    /// `Content-Type`, `MESSAGE-ID` → `Message-Id`).
    ///
    /// Names containing spaces or non-token bytes are returned trimmed but
    /// otherwise unchanged.
    pub fn canonical_key(name: &str) -> String {
        let name = name.trim();
        if name.bytes().any(|b| !b.is_ascii_graphic() || b == b':') {
            return name.to_string();
        }
        let mut out = String::with_capacity(name.len());
        let mut upper = true;
        for ch in name.chars() {
            if upper {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch.to_ascii_lowercase());
            }
            upper = ch == '-';
        }
        out
    }

    /// Append a value, keeping earlier values for the same key.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(Self::canonical_key(name))
            .or_default()
            .push(value.into());
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&Self::canonical_key(name))
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Every value of `name`, in order of appearance.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0
            .get(&Self::canonical_key(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(&Self::canonical_key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&Self::canonical_key(name))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `(key, values)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Every value of every key, for in-place rewriting.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.0.values_mut().flatten()
    }

    /// Rebuild a header mapping from an Outlook transport-headers blob.
    ///
    /// A line containing `": "` starts a new header; any other line is a
    /// fold and is appended to the previous value with no separator.
    pub fn from_transport_block(block: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in block.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            match line.split_once(": ") {
                Some((name, value)) if !name.is_empty() && !name.starts_with([' ', '\t']) => {
                    if let Some((k, v)) = current.take() {
                        headers.add(&k, v);
                    }
                    current = Some((name.to_string(), value.to_string()));
                }
                _ => {
                    if let Some((_, v)) = current.as_mut() {
                        v.push_str(line);
                    }
                }
            }
        }
        if let Some((k, v)) = current {
            headers.add(&k, v);
        }

        headers
    }
}

/// A fully resolved message.
///
/// Sub-messages are owned values; the tree has no back-references.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Message {
    #[serde(skip)]
    pub headers: Headers,

    pub message_id: String,

    /// Date as found in the source (RFC 2822 for binary-format timestamps).
    pub date: String,

    pub subject: String,

    /// Originating IP from the last `Received` header, when recoverable.
    pub sender_address: Option<String>,

    pub sender: Option<EmailAddress>,
    pub from: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,

    pub content_type: String,

    #[serde(skip)]
    pub body: Option<Vec<u8>>,
    #[serde(skip)]
    pub html: Option<Vec<u8>>,

    #[serde(rename = "embedded")]
    pub embeddeds: Vec<Embedded>,
    #[serde(rename = "attachment")]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "sub-message")]
    pub sub_messages: Vec<Message>,

    /// Candidate passwords found in the body text, in discovery order.
    /// Empty until [`Message::collect_passwords`] runs (see
    /// [`parse_path_with_passwords`](crate::parser::parse_path_with_passwords)).
    pub passwords: Vec<String>,
}

impl Message {
    /// Body as text, lossily decoded.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn html_text(&self) -> Option<String> {
        self.html
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Readable view of the plain-text body.
    pub fn body_reader(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// `date` normalized to UTC, tolerant of the usual broken formats.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.date)
    }

    /// Scan body and HTML of this message and every sub-message.
    pub fn collect_passwords(&mut self, extractor: &PasswordExtractor) {
        let html = self.html_text();
        let body = self.body_text();
        self.passwords = extractor.extract(html.as_deref(), body.as_deref());
        for sub in &mut self.sub_messages {
            sub.collect_passwords(extractor);
        }
    }

    /// Total number of messages in this tree, including `self`.
    pub fn message_count(&self) -> usize {
        1 + self
            .sub_messages
            .iter()
            .map(Message::message_count)
            .sum::<usize>()
    }
}
