//! Canonical message from a decoded RFC 822 tree.

use tracing::debug;

use super::{finalize_body, header_addresses, parse_addresses, sender_ip_or_none};
use crate::config::DecodeConfig;
use crate::model::{Attachment, Embedded, Message};
use crate::parser::charset::decode_text;
use crate::parser::header::{strip_angle_brackets, MediaType};
use crate::parser::mime::{RawBody, RawMessage};

/// Build a [`Message`] from a decoded MIME tree.
///
/// Leaves are visited depth-first; nested `message/*` nodes become
/// sub-messages and are unified recursively.
pub fn unify(raw: &RawMessage, config: &DecodeConfig) -> Message {
    let headers = &raw.headers;
    let from = header_addresses(headers, "From");
    let sender = headers
        .get("Sender")
        .and_then(|v| parse_addresses(v).into_iter().next())
        .or_else(|| from.first().cloned());

    let mut msg = Message {
        message_id: headers.get("Message-Id").unwrap_or_default().trim().to_string(),
        date: headers.get("Date").unwrap_or_default().trim().to_string(),
        subject: headers.get("Subject").unwrap_or_default().trim().to_string(),
        content_type: headers.get("Content-Type").unwrap_or_default().to_string(),
        sender_address: sender_ip_or_none(headers),
        sender,
        from,
        reply_to: header_addresses(headers, "Reply-To"),
        to: header_addresses(headers, "To"),
        cc: header_addresses(headers, "Cc"),
        bcc: header_addresses(headers, "Bcc"),
        headers: headers.clone(),
        ..Default::default()
    };

    let mut index = 0;
    walk(raw, &mut msg, config, &mut index);
    finalize_body(&mut msg, config);
    msg
}

fn walk(node: &RawMessage, msg: &mut Message, config: &DecodeConfig, index: &mut usize) {
    match &node.body {
        RawBody::Multipart(multipart) => {
            for part in &multipart.parts {
                walk(part, msg, config, index);
            }
        }
        RawBody::Nested(inner) => msg.sub_messages.push(unify(inner, config)),
        RawBody::Leaf(data) => {
            classify_leaf(node, data, msg, config, *index);
            *index += 1;
        }
    }
}

/// Where a leaf part ends up.
#[derive(Debug, PartialEq, Eq)]
enum Slot {
    Body,
    Html,
    Embedded(String),
    Attachment,
}

fn classify_leaf(
    node: &RawMessage,
    data: &[u8],
    msg: &mut Message,
    config: &DecodeConfig,
    index: usize,
) {
    let media = node.content_type();
    let mime = media
        .as_ref()
        .map_or("text/plain", |m| m.value.as_str())
        .to_string();
    let disposition = node.disposition();
    let content_id = node
        .headers
        .get("Content-Id")
        .map(|v| strip_angle_brackets(v.trim()).to_string())
        .filter(|v| !v.is_empty());

    let text_slot = match mime.as_str() {
        "text/plain" if msg.body.is_none() => Some(Slot::Body),
        "text/html" if msg.html.is_none() => Some(Slot::Html),
        _ => None,
    };

    let slot = match disposition.as_ref().map(|d| d.value.as_str()) {
        None => text_slot.unwrap_or_else(|| match content_id {
            Some(cid) if !mime.starts_with("text/") => Slot::Embedded(cid),
            _ => Slot::Attachment,
        }),
        Some("inline") => text_slot.unwrap_or_else(|| {
            Slot::Embedded(content_id.unwrap_or_else(|| format!("inline_{index}")))
        }),
        Some(_) => Slot::Attachment,
    };

    let charset = media.as_ref().and_then(|m| m.param("charset"));
    let content_type = || {
        node.headers
            .get("Content-Type")
            .map(str::trim)
            .filter(|v| media.is_some() && !v.is_empty())
            .map_or_else(|| mime.clone(), str::to_string)
    };
    match slot {
        Slot::Body | Slot::Html => {
            let text = decode_text(data, charset, config.repair_legacy_charset);
            if text.iter().all(u8::is_ascii_whitespace) {
                debug!(index, content_type = %mime, "Blank text part, leaving slot unset");
                return;
            }
            if slot == Slot::Body {
                msg.body = Some(text);
            } else {
                msg.html = Some(text);
            }
        }
        Slot::Embedded(content_id) => {
            debug!(cid = %content_id, content_type = %mime, "Embedded part");
            msg.embeddeds.push(Embedded {
                content_id,
                content_type: content_type(),
                data: data.to_vec(),
            });
        }
        Slot::Attachment => {
            let filename = attachment_name(disposition.as_ref(), media.as_ref(), index);
            debug!(filename = %filename, content_type = %mime, "Attachment part");
            msg.attachments.push(Attachment {
                filename,
                content_type: content_type(),
                data: data.to_vec(),
            });
        }
    }
}

/// Disposition `filename`, then Content-Type `name`, then `attachment_<index>`.
fn attachment_name(disposition: Option<&MediaType>, media: Option<&MediaType>, index: usize) -> String {
    disposition
        .and_then(|d| d.param("filename"))
        .or_else(|| media.and_then(|m| m.param("name")))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("attachment_{index}"))
}
