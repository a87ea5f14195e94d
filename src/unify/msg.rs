//! Canonical message from an unpacked Outlook property record.

use tracing::debug;

use super::{finalize_body, header_addresses, parse_addresses, sender_ip_or_none};
use crate::config::DecodeConfig;
use crate::model::{Attachment, EmailAddress, Embedded, Headers, Message};
use crate::parser::charset::{codepage_label, decode_encoded_word_run, decode_text};
use crate::parser::header::strip_angle_brackets;
use crate::parser::msg::property::ATTACH_DATA;
use crate::parser::msg::unpack::UnpackedRecord;

/// `RecipientType` values.
const MAPI_TO: i64 = 1;
const MAPI_CC: i64 = 2;
const MAPI_BCC: i64 = 3;

/// Build a [`Message`] from the root (or an embedded) message record.
pub fn unify(record: &UnpackedRecord, config: &DecodeConfig) -> Message {
    let mut headers = record
        .string("TransportMessageHeaders")
        .map(Headers::from_transport_block)
        .unwrap_or_default();
    for value in headers.values_mut() {
        if value.contains("=?") {
            *value = decode_encoded_word_run(value);
        }
    }

    let from = if headers.contains("From") {
        header_addresses(&headers, "From")
    } else {
        representing(record, "SentRepresentingSmtpAddress", "SentRepresentingName")
            .or_else(|| representing(record, "SenderSmtpAddress", "SenderName"))
            .into_iter()
            .collect()
    };
    let sender = headers
        .get("Sender")
        .and_then(|v| parse_addresses(v).into_iter().next())
        .or_else(|| from.first().cloned());

    let to = if headers.contains("To") {
        header_addresses(&headers, "To")
    } else {
        let listed = recipients(record, MAPI_TO);
        if listed.is_empty() {
            record
                .string("ReceivedRepresentingSmtpAddress")
                .map(parse_addresses)
                .unwrap_or_default()
        } else {
            listed
        }
    };
    let cc = if headers.contains("Cc") {
        header_addresses(&headers, "Cc")
    } else {
        recipients(record, MAPI_CC)
    };
    let bcc = if headers.contains("Bcc") {
        header_addresses(&headers, "Bcc")
    } else {
        recipients(record, MAPI_BCC)
    };
    let reply_to = if headers.contains("Reply-To") {
        header_addresses(&headers, "Reply-To")
    } else {
        record
            .string("ReplyRecipientNames")
            .map(parse_addresses)
            .unwrap_or_default()
    };

    let header = |name: &str| headers.get(name).unwrap_or_default().trim().to_string();
    let mut msg = Message {
        message_id: record
            .string("InternetMessageId")
            .map(str::to_string)
            .unwrap_or_else(|| header("Message-Id")),
        subject: record
            .string("Subject")
            .map(str::to_string)
            .unwrap_or_else(|| header("Subject")),
        date: record
            .time("MessageDeliveryTime")
            .or_else(|| record.time("ClientSubmitTime"))
            .unwrap_or_else(|| header("Date")),
        content_type: header("Content-Type"),
        sender_address: sender_ip_or_none(&headers),
        sender,
        from,
        reply_to,
        to,
        cc,
        bcc,
        body: record.string("Body").map(|b| b.as_bytes().to_vec()),
        html: html_body(record, config),
        ..Default::default()
    };
    msg.headers = headers;

    let html = msg.html_text();
    for (index, attachment) in record.attachments.iter().enumerate() {
        classify_attachment(attachment, index, html.as_deref(), &mut msg, config);
    }
    for nested in &record.messages {
        msg.sub_messages.push(unify(nested, config));
    }

    finalize_body(&mut msg, config);
    msg
}

/// A flat "representing" address property with its display name.
fn representing(record: &UnpackedRecord, address: &str, name: &str) -> Option<EmailAddress> {
    let mut parsed = parse_addresses(record.string(address)?).into_iter().next()?;
    if parsed.name.is_empty() {
        if let Some(display) = record.string(name) {
            parsed.name = display.to_string();
        }
    }
    Some(parsed)
}

/// Recipient sub-records of one `RecipientType`.
fn recipients(record: &UnpackedRecord, kind: i64) -> Vec<EmailAddress> {
    record
        .recipients
        .iter()
        .filter(|r| r.int("RecipientType") == Some(kind))
        .filter_map(|r| {
            let address = r
                .string("SmtpAddress")
                .or_else(|| r.string("EmailAddress").filter(|a| a.contains('@')))?;
            Some(EmailAddress::new(
                r.string("DisplayName").unwrap_or_default(),
                address,
            ))
        })
        .collect()
}

/// The Html property, trailing NULs removed, decoded with the declared
/// Internet code page when it is not UTF-8.
fn html_body(record: &UnpackedRecord, config: &DecodeConfig) -> Option<Vec<u8>> {
    let raw = record.bytes("Html")?;
    let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
    let raw = &raw[..end];
    if raw.is_empty() {
        return None;
    }
    let charset = record.int("InternetCodepage").and_then(codepage_label);
    Some(decode_text(raw, charset, config.repair_legacy_charset))
}

fn classify_attachment(
    attachment: &UnpackedRecord,
    index: usize,
    html: Option<&str>,
    msg: &mut Message,
    config: &DecodeConfig,
) {
    if !attachment.messages.is_empty() {
        for nested in &attachment.messages {
            msg.sub_messages.push(unify(nested, config));
        }
        return;
    }

    let Some(data) = attachment.bytes(ATTACH_DATA) else {
        debug!(index, "Attachment without data, skipping");
        return;
    };
    let content_type = attachment
        .string("AttachMimeTag")
        .unwrap_or("application/octet-stream")
        .to_string();

    let content_id = attachment
        .string("AttachContentId")
        .map(|cid| strip_angle_brackets(cid.trim()).to_string())
        .filter(|cid| !cid.is_empty());
    if let Some(content_id) = content_id {
        let referenced = html.is_some_and(|h| h.contains(&format!("cid:{content_id}")));
        if referenced || attachment.flag("AttachmentHidden") {
            debug!(cid = %content_id, "Embedded attachment");
            msg.embeddeds.push(Embedded {
                content_id,
                content_type,
                data: data.to_vec(),
            });
            return;
        }
    }

    let filename = ["AttachLongFilename", "AttachFilename", "DisplayName"]
        .iter()
        .find_map(|p| attachment.string(p))
        .map(str::to_string)
        .unwrap_or_else(|| format!("attachment_{index}"));
    debug!(filename = %filename, "Attachment");
    msg.attachments.push(Attachment {
        filename,
        content_type,
        data: data.to_vec(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::msg::property::PropertyValue;

    fn record(props: &[(&'static str, PropertyValue)]) -> UnpackedRecord {
        UnpackedRecord {
            props: props.iter().cloned().collect(),
            ..Default::default()
        }
    }

    fn s(v: &str) -> PropertyValue {
        PropertyValue::String(v.to_string())
    }

    #[test]
    fn test_headers_win_over_properties() {
        let rec = record(&[
            (
                "TransportMessageHeaders",
                s("From: Ann <ann@example.com>\r\nTo: bob@example.com\r\nReceived: from x\r\n (x [93.125.114.11])\r\nSubject: =?utf-8?B?5a+G56CB?=\r\n"),
            ),
            ("SentRepresentingSmtpAddress", s("other@example.com")),
            ("InternetMessageId", s("<id@x>")),
        ]);
        let msg = unify(&rec, &DecodeConfig::default());
        assert_eq!(msg.from[0].address, "ann@example.com");
        assert_eq!(msg.sender.as_ref().unwrap().name, "Ann");
        assert_eq!(msg.to[0].address, "bob@example.com");
        assert_eq!(msg.sender_address.as_deref(), Some("93.125.114.11"));
        assert_eq!(msg.subject, "密码");
        assert_eq!(msg.message_id, "<id@x>");
    }

    #[test]
    fn test_property_fallbacks() {
        let mut rec = record(&[
            ("SentRepresentingSmtpAddress", s("ann@example.com")),
            ("SentRepresentingName", s("Ann")),
            ("ReceivedRepresentingSmtpAddress", s("me@example.com")),
            ("Subject", s("Hi")),
            ("MessageDeliveryTime", PropertyValue::Time(132_539_328_000_000_000)),
        ]);
        rec.recipients.push(record(&[
            ("RecipientType", PropertyValue::Int32(2)),
            ("SmtpAddress", s("cc@example.com")),
            ("DisplayName", s("Cee")),
        ]));
        let msg = unify(&rec, &DecodeConfig::default());
        assert_eq!(msg.from, vec![EmailAddress::new("Ann", "ann@example.com")]);
        assert_eq!(msg.to, vec![EmailAddress::new("", "me@example.com")]);
        assert_eq!(msg.cc, vec![EmailAddress::new("Cee", "cc@example.com")]);
        assert!(msg.bcc.is_empty());
        assert!(msg.date.contains("2021"));
        assert_eq!(msg.subject, "Hi");
        assert!(msg.sender_address.is_none());
    }

    #[test]
    fn test_html_codepage_and_body_fallback() {
        let rec = record(&[
            ("Html", PropertyValue::Binary(b"<p>\xc3\xdc\xc2\xeb</p>\0\0".to_vec())),
            ("InternetCodepage", PropertyValue::Int32(936)),
        ]);
        let msg = unify(&rec, &DecodeConfig::default());
        assert_eq!(msg.html_text().as_deref(), Some("<p>密码</p>"));
        assert_eq!(msg.body_text().as_deref(), Some("密码"));
    }

    #[test]
    fn test_attachment_classification() {
        let mut rec = record(&[("Html", PropertyValue::Binary(b"<img src=\"cid:img1\">".to_vec()))]);
        rec.attachments.push(record(&[
            (ATTACH_DATA, PropertyValue::Binary(b"PNG".to_vec())),
            ("AttachContentId", s("<img1>")),
            ("AttachMimeTag", s("image/png")),
        ]));
        rec.attachments.push(record(&[
            (ATTACH_DATA, PropertyValue::Binary(b"PDF".to_vec())),
            ("AttachLongFilename", s("report.pdf")),
            ("AttachFilename", s("REPORT~1.PDF")),
            ("AttachContentId", s("unused")),
        ]));
        rec.attachments.push(record(&[(ATTACH_DATA, PropertyValue::Binary(b"?".to_vec()))]));
        rec.attachments.push(record(&[("DisplayName", s("no data"))]));
        let mut forwarded = record(&[("DisplayName", s("Fwd"))]);
        forwarded.messages.push(record(&[("Subject", s("inner"))]));
        rec.attachments.push(forwarded);

        let msg = unify(&rec, &DecodeConfig::default());
        assert_eq!(msg.embeddeds.len(), 1);
        assert_eq!(msg.embeddeds[0].content_id, "img1");
        let names: Vec<&str> = msg.attachments.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["report.pdf", "attachment_2"]);
        assert_eq!(msg.attachments[1].content_type, "application/octet-stream");
        assert_eq!(msg.sub_messages.len(), 1);
        assert_eq!(msg.sub_messages[0].subject, "inner");
    }
}
