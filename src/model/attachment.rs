//! Attachments and inline embedded resources.
//!
//! Both own their decoded payload. Serialization emits metadata and the
//! payload size only.

use serde::{Serialize, Serializer};

/// A downloadable file carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Attachment {
    /// Decoded filename, or a synthesized `attachment_<n>` name.
    pub filename: String,

    /// `Content-Type` as declared, parameters included
    /// (e.g. `"image/jpeg; name=\"a.jpg\""`).
    pub content_type: String,

    /// Decoded payload.
    #[serde(rename = "size", serialize_with = "serialize_len")]
    pub data: Vec<u8>,
}

/// A resource referenced from the HTML body through `cid:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Embedded {
    /// Content-ID without angle brackets.
    #[serde(rename = "cid")]
    pub content_id: String,

    pub content_type: String,

    #[serde(rename = "size", serialize_with = "serialize_len")]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Readable view of the payload.
    pub fn reader(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Embedded {
    /// Readable view of the payload.
    pub fn reader(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// File extension guessed from the content type, used when exporting.
    pub fn extension(&self) -> &'static str {
        extension_for(&self.content_type)
    }
}

fn serialize_len<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(data.len() as u64)
}

/// Best-effort extension for a MIME type. Parameters are ignored.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/css" => "css",
        "application/pdf" => "pdf",
        "message/rfc822" => "eml",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_reports_size_not_payload() {
        let att = Attachment {
            filename: "a.txt".into(),
            content_type: "text/plain".into(),
            data: b"hello".to_vec(),
        };
        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(json["filename"], "a.txt");
        assert_eq!(json["content-type"], "text/plain");
        assert_eq!(json["size"], 5);
    }

    #[test]
    fn test_embedded_extension() {
        let emb = Embedded {
            content_id: "logo".into(),
            content_type: "image/PNG".into(),
            data: Vec::new(),
        };
        assert_eq!(emb.extension(), "png");
        assert_eq!(extension_for("application/x-unknown"), "bin");
        assert_eq!(extension_for("Image/JPEG; name=\"a.jpg\""), "jpg");
    }
}
