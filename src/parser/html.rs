//! HTML to plain text, for the Body fallback and the password scan.

/// Convert HTML to plain text.
///
/// - Preserves line breaks from `<br>`, `<p>`, `<div>` and friends
/// - Removes `<script>`, `<style>` and `<head>` blocks
/// - Decodes named and numeric character references
/// - Collapses runs of blank lines
pub fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();
    for tag in ["script", "style", "head"] {
        text = remove_tag_block(&text, tag);
    }

    let stripped = strip_tags(&text);
    let decoded = decode_entities(&stripped);

    let mut prev_was_blank = false;
    let mut cleaned = String::with_capacity(decoded.len());
    for line in decoded.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Drop every tag, turning block-level ones into newlines.
fn strip_tags(html: &str) -> String {
    const BLOCK: [&str; 14] = [
        "br", "p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6", "table", "ul", "ol",
    ];

    let mut result = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            // Unterminated tag: drop the remainder.
            rest = "";
            break;
        };
        let name: String = after[..close]
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if BLOCK.contains(&name.as_str()) {
            result.push('\n');
        }
        rest = &after[close + 1..];
    }
    result.push_str(rest);
    result
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;

    // ASCII lower-casing keeps byte offsets aligned with `remaining`.
    while let Some(start) = remaining.to_ascii_lowercase().find(&open) {
        let boundary = remaining.as_bytes().get(start + open.len()).copied();
        if !matches!(boundary, None | Some(b'>' | b' ' | b'\t' | b'\r' | b'\n' | b'/')) {
            // `<header>` is not `<head>`.
            result.push_str(&remaining[..start + open.len()]);
            remaining = &remaining[start + open.len()..];
            continue;
        }
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match after.to_ascii_lowercase().find(&close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}

/// Decode `&name;`, `&#NN;` and `&#xHH;` references. Unknown ones are kept.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let end = after
            .char_indices()
            .take(10)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i);

        let decoded = end.and_then(|end| {
            let entity = &after[..end];
            let ch = match entity.strip_prefix('#') {
                Some(num) => {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
                None => named_entity(entity),
            }?;
            Some((ch, end))
        });

        match decoded {
            Some((ch, end)) => {
                out.push(if ch == '\u{a0}' { ' ' } else { ch });
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "copy" => '©',
        "reg" => '®',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "laquo" => '«',
        "raquo" => '»',
        "euro" => '€',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_basic() {
        let text = html_to_text("<p>Hello <b>world</b></p><P>Second paragraph</P>");
        assert!(text.contains("Hello world"));
        assert!(text.contains("Second paragraph"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
        assert_eq!(html_to_text("&#23494;&#x7801;&nbsp;ok"), "密码 ok");
        assert_eq!(html_to_text("AT&T &bogus; & co"), "AT&T &bogus; & co");
    }

    #[test]
    fn test_html_to_text_removes_scripts() {
        assert_eq!(html_to_text("Before<SCRIPT>alert('x')</script>After"), "BeforeAfter");
        assert_eq!(
            html_to_text("<html><head><title>t</title></head><body>ünï</body></html>"),
            "ünï"
        );
    }

    #[test]
    fn test_html_to_text_line_breaks() {
        assert_eq!(html_to_text("a<br>b<br/>c"), "a\nb\nc");
    }
}
