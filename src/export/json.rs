//! JSON rendering of a decoded message.
//!
//! Keys are kebab-case (`message-id`, `sub-message`); payloads are omitted
//! and attachments report their `size`.

use crate::error::{MailError, Result};
use crate::model::Message;

pub fn to_json(msg: &Message) -> Result<String> {
    serde_json::to_string_pretty(msg).map_err(|e| MailError::Export(e.to_string()))
}

/// JSON value form, for callers that post-process the tree.
pub fn to_value(msg: &Message) -> Result<serde_json::Value> {
    serde_json::to_value(msg).map_err(|e| MailError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attachment, EmailAddress};

    #[test]
    fn test_json_shape() {
        let msg = Message {
            subject: "Quarterly".into(),
            from: vec![EmailAddress::new("Ann", "ann@example.com")],
            body: Some(b"secret body".to_vec()),
            attachments: vec![Attachment {
                filename: "a.txt".into(),
                content_type: "text/plain".into(),
                data: b"hello".to_vec(),
            }],
            sub_messages: vec![Message {
                subject: "inner".into(),
                ..Default::default()
            }],
            passwords: vec!["abc123".into()],
            ..Default::default()
        };

        let value = to_value(&msg).unwrap();
        assert_eq!(value["subject"], "Quarterly");
        assert_eq!(value["from"][0]["address"], "ann@example.com");
        assert_eq!(value["attachment"][0]["size"], 5);
        assert_eq!(value["sub-message"][0]["subject"], "inner");
        assert_eq!(value["passwords"][0], "abc123");
        assert!(value["sender-address"].is_null());

        let text = to_json(&msg).unwrap();
        assert!(!text.contains("secret body"));
        assert!(text.contains("\"message-id\""));
    }
}
