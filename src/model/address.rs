//! Email address parsing (RFC 5322 §3.4).

use serde::{Deserialize, Serialize};

/// A parsed mailbox.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Build an address from already-separated parts.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Parse a single mailbox from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// Returns `None` when no syntactically plausible mailbox is present.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        // "Display Name <address>" or "<address>"
        if let Some(angle_start) = trimmed.rfind('<') {
            let angle_end = trimmed.rfind('>')?;
            if angle_end <= angle_start {
                return None;
            }
            let addr = trimmed[angle_start + 1..angle_end].trim();
            if !is_plausible_mailbox(addr) {
                return None;
            }
            return Some(Self {
                name: strip_quotes(&trimmed[..angle_start]),
                address: addr.to_string(),
            });
        }

        // "user@domain.com (Comment Name)"
        if let Some(paren) = trimmed.find('(') {
            let addr = trimmed[..paren].trim();
            if is_plausible_mailbox(addr) {
                let comment = trimmed[paren + 1..].trim_end_matches(')').trim();
                return Some(Self::new(comment, addr));
            }
        }

        is_plausible_mailbox(trimmed).then(|| Self::new("", trimmed))
    }

    /// Parse an address list, dropping malformed entries.
    ///
    /// Separators are `,` and `;` outside quotes and angle brackets:
    /// `"Last, First" <a@b.com>; other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' | ';' if !in_quotes && !in_angle => {
                    results.extend(Self::parse_entry(&current));
                    current.clear();
                }
                _ => current.push(ch),
            }
        }
        results.extend(Self::parse_entry(&current));

        results
    }

    fn parse_entry(raw: &str) -> Option<Self> {
        let parsed = Self::parse(raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            tracing::debug!(entry = raw.trim(), "Dropping malformed address");
        }
        parsed
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.name, self.address)
        }
    }
}

/// `local@domain` with both halves non-empty and no whitespace.
fn is_plausible_mailbox(addr: &str) -> bool {
    match addr.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !addr.chars().any(|c| c.is_whitespace() || c == '<' || c == '>')
        }
        None => false,
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com").unwrap();
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.name, "");
    }

    #[test]
    fn test_parse_angle_address() {
        let addr = EmailAddress::parse("<user@example.com>").unwrap();
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>").unwrap();
        assert_eq!(addr.address, "user1@example.com");
        assert_eq!(addr.name, "User One");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>").unwrap();
        assert_eq!(addr.name, "Last, First");
    }

    #[test]
    fn test_parse_comment_name() {
        let addr = EmailAddress::parse("user@example.com (User)").unwrap();
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.name, "User");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(EmailAddress::parse("").is_none());
        assert!(EmailAddress::parse("undisclosed-recipients:").is_none());
        assert!(EmailAddress::parse("Name <broken").is_none());
        assert!(EmailAddress::parse("<@example.com>").is_none());
    }

    #[test]
    fn test_parse_list() {
        let list =
            EmailAddress::parse_list("User One <a@b.com>, User Two <c@d.com>; plain@addr.com");
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].address, "a@b.com");
        assert_eq!(list[1].name, "User Two");
        assert_eq!(list[2].address, "plain@addr.com");
    }

    #[test]
    fn test_parse_list_drops_malformed_entries() {
        let list = EmailAddress::parse_list("good@a.com, not an address, <x@y.org>");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].address, "good@a.com");
        assert_eq!(list[1].address, "x@y.org");
    }

    #[test]
    fn test_parse_list_with_quoted_separators() {
        let list = EmailAddress::parse_list("\"Last; First\" <a@b.com>, other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Last; First");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EmailAddress::new("Alice", "alice@example.com").display(),
            "Alice <alice@example.com>"
        );
        assert_eq!(
            EmailAddress::new("", "alice@example.com").to_string(),
            "alice@example.com"
        );
    }
}
