//! Write attachments and embedded resources to disk.

use std::path::{Path, PathBuf};

use crate::error::{MailError, Result};
use crate::model::Message;

/// Export every attachment and embedded resource of `msg`, recursing into
/// sub-messages (`sub_<n>/` below `output_dir`).
///
/// A file that fails to write is logged and skipped; creating a directory
/// is an error.
pub fn export_attachments(msg: &Message, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| MailError::io(output_dir, e))?;
    let mut paths = Vec::new();

    for att in &msg.attachments {
        let name = sanitize_filename_part(&att.filename, 150);
        if let Some(path) = write_unique(output_dir, &name, att.reader()) {
            paths.push(path);
        }
    }

    for emb in &msg.embeddeds {
        let stem = sanitize_filename_part(&emb.content_id, 120);
        let ext = emb.extension();
        let name = if stem.to_ascii_lowercase().ends_with(&format!(".{ext}")) {
            stem
        } else {
            format!("{stem}.{ext}")
        };
        if let Some(path) = write_unique(output_dir, &name, emb.reader()) {
            paths.push(path);
        }
    }

    for (i, sub) in msg.sub_messages.iter().enumerate() {
        if sub.attachments.is_empty() && sub.embeddeds.is_empty() && sub.sub_messages.is_empty() {
            continue;
        }
        paths.extend(export_attachments(sub, &output_dir.join(format!("sub_{i}")))?);
    }

    Ok(paths)
}

fn write_unique(dir: &Path, name: &str, data: &[u8]) -> Option<PathBuf> {
    let path = unique_path(&dir.join(name));
    match std::fs::write(&path, data) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), bytes = data.len(), "Exported");
            Some(path)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to export attachment");
            None
        }
    }
}

/// Make a string safe to use as a file name.
///
/// Keeps letters, digits, `-`, `.`, `_` and `@`; everything else becomes
/// `_`. Leading dots are replaced so the result is never hidden or `..`.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();
    let sanitized = match sanitized.strip_prefix('.') {
        Some(rest) => format!("_{rest}"),
        None => sanitized,
    };

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem}_dup.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attachment, Embedded};
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    fn attachment(name: &str, data: &[u8]) -> Attachment {
        Attachment {
            filename: name.into(),
            content_type: "application/octet-stream".into(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("hello world", 20), "hello_world");
        assert_eq!(sanitize_filename_part("报告.pdf", 20), "报告.pdf");
        assert_eq!(sanitize_filename_part("../../etc/passwd", 30), "_._.._etc_passwd");
        assert_eq!(sanitize_filename_part("a/b\\c:d*e", 20), "a_b_c_d_e");
        assert_eq!(sanitize_filename_part("  ", 20), "unknown");
    }

    #[test]
    fn test_export_tree() {
        let dir = assert_fs::TempDir::new().unwrap();
        let msg = Message {
            attachments: vec![attachment("a.txt", b"one"), attachment("a.txt", b"two")],
            embeddeds: vec![Embedded {
                content_id: "logo@x".into(),
                content_type: "image/png".into(),
                data: b"PNG".to_vec(),
            }],
            sub_messages: vec![Message {
                attachments: vec![attachment("inner.bin", b"3")],
                ..Default::default()
            }],
            ..Default::default()
        };

        let paths = export_attachments(&msg, dir.path()).unwrap();
        assert_eq!(paths.len(), 4);
        dir.child("a.txt").assert("one");
        dir.child("a_1.txt").assert("two");
        dir.child("logo@x.png").assert(predicate::path::exists());
        dir.child("sub_0/inner.bin").assert("3");
        dir.close().unwrap();
    }

    #[test]
    fn test_export_empty_message() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        assert!(export_attachments(&Message::default(), &out).unwrap().is_empty());
        assert!(out.is_dir());
    }
}
