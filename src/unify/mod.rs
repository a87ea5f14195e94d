//! Build the canonical [`Message`] from either decoder's intermediate tree.
//!
//! [`eml`] walks a [`RawMessage`](crate::parser::mime::RawMessage);
//! [`msg`] reads an [`UnpackedRecord`](crate::parser::msg::unpack::UnpackedRecord).
//! The helpers here are shared by both.

pub mod eml;
pub mod msg;

use crate::config::DecodeConfig;
use crate::error::TraceError;
use crate::model::{EmailAddress, Headers, Message};
use crate::parser::charset::decode_encoded_word_run;
use crate::parser::html::html_to_text;

/// Shortest bracketed span that can hold an address (`1.1.1.1`).
const MIN_ADDRESS_LEN: usize = 7;

/// Originating IP from the last `Received` header.
///
/// Takes the text between the last `[` and the `]` after it.
pub fn sender_ip(headers: &Headers) -> std::result::Result<String, TraceError> {
    let last = headers
        .get_all("Received")
        .last()
        .ok_or(TraceError::MissingReceived)?;
    let open = last.rfind('[').ok_or(TraceError::AddressNotFound)?;
    let rest = &last[open + 1..];
    let close = rest.find(']').ok_or(TraceError::AddressNotFound)?;
    let span = rest[..close].trim();
    if span.chars().count() < MIN_ADDRESS_LEN {
        return Err(TraceError::AddressNotFound);
    }
    Ok(span.to_string())
}

/// `sender_ip`, logging and discarding the failure.
pub(crate) fn sender_ip_or_none(headers: &Headers) -> Option<String> {
    match sender_ip(headers) {
        Ok(ip) => Some(ip),
        Err(e) => {
            tracing::debug!(reason = %e, "No sender address");
            None
        }
    }
}

/// Every address in every value of `name`.
pub fn header_addresses(headers: &Headers, name: &str) -> Vec<EmailAddress> {
    headers
        .get_all(name)
        .iter()
        .flat_map(|value| parse_addresses(value))
        .collect()
}

/// Parse an address list, decoding display names still wrapped in
/// encoded words.
pub fn parse_addresses(raw: &str) -> Vec<EmailAddress> {
    let mut list = EmailAddress::parse_list(raw);
    for addr in &mut list {
        if addr.name.contains("=?") {
            addr.name = decode_encoded_word_run(&addr.name);
        }
    }
    list
}

/// Apply the Body←Html fallback.
pub(crate) fn finalize_body(msg: &mut Message, config: &DecodeConfig) {
    if !config.html_body_fallback || msg.body.is_some() {
        return;
    }
    if let Some(html) = msg.html_text() {
        let text = html_to_text(&html);
        if !text.is_empty() {
            tracing::trace!("Body absent, using text rendering of Html");
            msg.body = Some(text.into_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(values: &[&str]) -> Headers {
        let mut h = Headers::new();
        for v in values {
            h.add("Received", *v);
        }
        h
    }

    #[test]
    fn test_sender_ip_uses_last_received() {
        let h = received(&[
            "from a ([10.0.0.1]) by b",
            "from mail.example.com (mail [93.125.114.11]) by mx",
        ]);
        assert_eq!(sender_ip(&h).unwrap(), "93.125.114.11");
    }

    #[test]
    fn test_sender_ip_last_bracket_on_line() {
        let h = received(&["from [bogus] x ([2001:db8::1]) by y"]);
        assert_eq!(sender_ip(&h).unwrap(), "2001:db8::1");
    }

    #[test]
    fn test_sender_ip_failures() {
        assert_eq!(sender_ip(&Headers::new()), Err(TraceError::MissingReceived));
        assert_eq!(
            sender_ip(&received(&["from x [1.2.3] by y"])),
            Err(TraceError::AddressNotFound)
        );
        assert_eq!(
            sender_ip(&received(&["from localhost by y"])),
            Err(TraceError::AddressNotFound)
        );
        assert_eq!(sender_ip_or_none(&received(&["[a]"])), None);
    }

    #[test]
    fn test_parse_addresses_decodes_leftover_words() {
        let list = parse_addresses("\"=?utf-8?B?5byg5LiJ?=\" <zs@example.com>, broken, b@x.org");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "张三");
        assert_eq!(list[1].address, "b@x.org");
    }

    #[test]
    fn test_finalize_body_fallback() {
        let mut msg = Message {
            html: Some(b"<p>Hi &amp; bye</p>".to_vec()),
            ..Default::default()
        };
        finalize_body(&mut msg, &DecodeConfig::default());
        assert_eq!(msg.body_text().as_deref(), Some("Hi & bye"));

        let mut msg = Message {
            html: Some(b"<p>x</p>".to_vec()),
            ..Default::default()
        };
        let config = DecodeConfig {
            html_body_fallback: false,
            ..Default::default()
        };
        finalize_body(&mut msg, &config);
        assert!(msg.body.is_none());
    }
}
