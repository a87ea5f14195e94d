//! Heuristic extraction of passwords announced in a message body
//! ("the archive password is: x7#k2p").

use regex::Regex;
use tracing::trace;

use super::sunday::{FoldedText, SundayMatcher};
use crate::config::PasswordConfig;
use crate::parser::html::html_to_text;

/// Token made of ASCII letters, digits and the usual password symbols.
const ASCII_TOKEN: &str = r"[0-9a-zA-Z$&+,:;=?@#|'<>.-^*()%!][0-9a-zA-Z$&+,:;=?@#|'<>.-^*()%! ]{2,20}";

/// Same, also accepting CJK unified ideographs.
const CJK_TOKEN: &str = r"[\x{4e00}-\x{9fa5}0-9a-zA-Z$&+,:;=?@#|'<>.-^*()%!][\x{4e00}-\x{9fa5}0-9a-zA-Z$&+,:;=?@#|'<>.-^*()%! ]{2,20}";

/// Keyword scanner built once from a [`PasswordConfig`].
///
/// Holds no mutable state; one extractor can serve any number of scans.
#[derive(Debug, Clone)]
pub struct PasswordExtractor {
    keywords: Vec<SundayMatcher>,
    exclusions: Vec<String>,
    ascii: Regex,
    cjk: Regex,
    min_length: usize,
}

impl PasswordExtractor {
    pub fn new(config: &PasswordConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            keywords: config
                .keywords
                .iter()
                .map(|k| SundayMatcher::keyword(k))
                .filter(|m| !m.is_empty())
                .collect(),
            exclusions: config.exclusions.clone(),
            ascii: Regex::new(ASCII_TOKEN)?,
            cjk: Regex::new(CJK_TOKEN)?,
            min_length: config.min_length,
        })
    }

    /// Candidates from the HTML (tags stripped) and the plain text, in
    /// discovery order, without duplicates.
    pub fn extract(&self, html: Option<&str>, text: Option<&str>) -> Vec<String> {
        let mut found = Vec::new();
        if let Some(html) = html.filter(|h| !h.is_empty()) {
            self.scan(&html_to_text(html), &mut found);
        }
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.scan(text, &mut found);
        }
        found
    }

    fn scan(&self, text: &str, found: &mut Vec<String>) {
        let folded = FoldedText::new(text);
        for keyword in &self.keywords {
            for end in folded.match_ends(keyword) {
                let Some(candidate) = self.candidate_after(&text[end..]) else {
                    continue;
                };
                if candidate.chars().count() > self.min_length && !found.contains(&candidate) {
                    trace!(candidate = %candidate, "Password candidate");
                    found.push(candidate);
                }
            }
        }
    }

    /// The token following a keyword, `None` when an exclusion marker
    /// comes first or nothing token-like follows.
    fn candidate_after(&self, rest: &str) -> Option<String> {
        let lead = rest.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '：' | '='));
        if self.exclusions.iter().any(|e| lead.starts_with(e.as_str())) {
            return None;
        }

        let token = self
            .ascii
            .find(rest)
            .or_else(|| self.cjk.find(rest))?
            .as_str();
        let token = token.strip_prefix(':').unwrap_or(token).trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}
