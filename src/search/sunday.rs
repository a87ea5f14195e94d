//! Sunday (quick-search) substring matching.
//!
//! [`FoldedText`] lower-cases a text and drops spaces, tabs and line breaks
//! so that a keyword split across a wrapped line still matches; every byte
//! of the folded form remembers where it came from in the original.

/// A compiled search pattern.
#[derive(Debug, Clone)]
pub struct SundayMatcher {
    pattern: Vec<u8>,
    /// Skip distance keyed by the byte just past the current window.
    shift: [usize; 256],
}

impl SundayMatcher {
    /// Compile `pattern` as raw bytes.
    pub fn new(pattern: &[u8]) -> Self {
        let m = pattern.len();
        let mut shift = [m + 1; 256];
        for (i, &b) in pattern.iter().enumerate() {
            shift[b as usize] = m - i;
        }
        Self {
            pattern: pattern.to_vec(),
            shift,
        }
    }

    /// Compile a keyword in folded form (see [`FoldedText`]).
    pub fn keyword(keyword: &str) -> Self {
        Self::new(FoldedText::new(keyword).as_bytes())
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// First occurrence of the pattern in `haystack[from..]`.
    pub fn find_from(&self, haystack: &[u8], from: usize) -> Option<usize> {
        let m = self.pattern.len();
        let n = haystack.len();
        if m == 0 {
            return None;
        }

        let mut i = from;
        while i + m <= n {
            if haystack[i..i + m] == self.pattern[..] {
                return Some(i);
            }
            let Some(&next) = haystack.get(i + m) else {
                break;
            };
            i += self.shift[next as usize];
        }
        None
    }

    /// Start offsets of every non-overlapping occurrence.
    pub fn find_all(&self, haystack: &[u8]) -> Vec<usize> {
        let mut found = Vec::new();
        let mut from = 0;
        while let Some(pos) = self.find_from(haystack, from) {
            found.push(pos);
            from = pos + self.pattern.len();
        }
        found
    }
}

/// Lower-cased, whitespace-free view of a text.
#[derive(Debug, Clone)]
pub struct FoldedText {
    folded: String,
    /// For each byte of `folded`, the byte offset just past the source
    /// character it came from.
    ends: Vec<usize>,
}

impl FoldedText {
    pub fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut ends = Vec::with_capacity(text.len());
        for (offset, ch) in text.char_indices() {
            if matches!(ch, ' ' | '\t' | '\r' | '\n') {
                continue;
            }
            let end = offset + ch.len_utf8();
            for lower in ch.to_lowercase() {
                folded.push(lower);
                ends.resize(folded.len(), end);
            }
        }
        Self { folded, ends }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.folded.as_bytes()
    }

    /// Offsets in the source text just past each match of `matcher`.
    pub fn match_ends(&self, matcher: &SundayMatcher) -> Vec<usize> {
        matcher
            .find_all(self.as_bytes())
            .into_iter()
            .filter_map(|start| self.ends.get(start + matcher.len() - 1).copied())
            .collect()
    }
}
