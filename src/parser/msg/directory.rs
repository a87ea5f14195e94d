//! One-pass arena of the Compound File storages that make up a message.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use cfb::CompoundFile;

use super::tags::{ATTACH_PREFIX, NAMEID_STORAGE, RECIP_PREFIX, SUBSTG_PREFIX};
use crate::error::{MailError, Result};

/// What a storage holds, classified by its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// An embedded message (`__substg1.0_3701000D` under an attachment).
    Message,
    Attachment,
    Recipient,
    NameId,
    Other,
}

impl NodeKind {
    fn classify(name: &str) -> Self {
        if name.starts_with(ATTACH_PREFIX) {
            Self::Attachment
        } else if name.starts_with(RECIP_PREFIX) {
            Self::Recipient
        } else if name.starts_with(SUBSTG_PREFIX) {
            Self::Message
        } else if name == NAMEID_STORAGE {
            Self::NameId
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageNode {
    pub kind: NodeKind,
    pub name: String,
    /// `(stream name, contents)` of the streams directly inside this storage.
    pub streams: Vec<(String, Vec<u8>)>,
    /// Indices of child storages, ordered by name.
    pub children: Vec<usize>,
}

impl StorageNode {
    fn new(kind: NodeKind, name: String) -> Self {
        Self {
            kind,
            name,
            streams: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Storages of a container, indexed; node 0 is the root.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    nodes: Vec<StorageNode>,
}

impl DirectoryTree {
    pub const ROOT: usize = 0;

    /// Walk the container once and read every stream into its storage node.
    ///
    /// A stream that cannot be read is skipped with a warning.
    pub fn read<F: Read + Seek>(comp: &mut CompoundFile<F>) -> Result<Self> {
        let mut entries: Vec<(PathBuf, String, bool)> = comp
            .walk()
            .filter(|e| !e.is_root())
            .map(|e| (e.path().to_path_buf(), e.name().to_string(), e.is_stream()))
            .collect();
        entries.sort_by_key(|(path, _, _)| path.components().count());

        let mut tree = Self {
            nodes: vec![StorageNode::new(NodeKind::Root, String::new())],
        };
        let mut index: HashMap<PathBuf, usize> = HashMap::new();
        index.insert(PathBuf::from("/"), Self::ROOT);

        for (path, name, is_stream) in entries {
            let Some(parent) = path.parent().and_then(|p| index.get(p)).copied() else {
                tracing::warn!(path = %path.display(), "Directory entry without parent storage, skipping");
                continue;
            };

            if is_stream {
                match read_stream(comp, &path) {
                    Ok(data) => tree.nodes[parent].streams.push((name, data)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Unreadable stream, skipping");
                    }
                }
                continue;
            }

            let idx = tree.nodes.len();
            tree.nodes.push(StorageNode::new(NodeKind::classify(&name), name));
            tree.nodes[parent].children.push(idx);
            index.insert(path, idx);
        }

        for i in 0..tree.nodes.len() {
            let mut children = std::mem::take(&mut tree.nodes[i].children);
            children.sort_by(|a, b| tree.nodes[*a].name.cmp(&tree.nodes[*b].name));
            tree.nodes[i].children = children;
        }

        tracing::debug!(storages = tree.nodes.len(), "Read compound file directory");
        Ok(tree)
    }

    pub fn node(&self, idx: usize) -> &StorageNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn read_stream<F: Read + Seek>(comp: &mut CompoundFile<F>, path: &Path) -> std::io::Result<Vec<u8>> {
    let mut stream = comp.open_stream(path)?;
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    Ok(data)
}

/// Open a Compound File container, mapping failure to a structural error.
pub fn open<F: Read + Seek>(inner: F) -> Result<CompoundFile<F>> {
    CompoundFile::open(inner).map_err(|e| MailError::InvalidCompoundFile(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn build() -> Vec<u8> {
        let mut comp = CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        comp.create_stream("/__substg1.0_0037001F")
            .unwrap()
            .write_all(b"s\0")
            .unwrap();
        comp.create_storage("/__attach_version1.0_#00000001").unwrap();
        comp.create_storage("/__attach_version1.0_#00000000").unwrap();
        comp.create_storage("/__attach_version1.0_#00000000/__substg1.0_3701000D")
            .unwrap();
        comp.create_stream("/__attach_version1.0_#00000000/__substg1.0_3701000D/__substg1.0_0037001F")
            .unwrap()
            .write_all(b"n\0")
            .unwrap();
        comp.create_storage("/__recip_version1.0_#00000000").unwrap();
        comp.flush().unwrap();
        comp.into_inner().into_inner()
    }

    #[test]
    fn test_tree_classifies_storages() {
        let mut comp = open(Cursor::new(build())).unwrap();
        let tree = DirectoryTree::read(&mut comp).unwrap();
        let root = tree.node(DirectoryTree::ROOT);
        assert_eq!(root.streams.len(), 1);
        assert_eq!(root.streams[0].0, "__substg1.0_0037001F");

        let kinds: Vec<NodeKind> = root.children.iter().map(|c| tree.node(*c).kind).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Attachment, NodeKind::Attachment, NodeKind::Recipient]
        );

        let first = tree.node(root.children[0]);
        assert_eq!(first.name, "__attach_version1.0_#00000000");
        let nested = tree.node(first.children[0]);
        assert_eq!(nested.kind, NodeKind::Message);
        assert_eq!(nested.streams[0].1, b"n\0");
    }

    #[test]
    fn test_open_rejects_non_cfb() {
        assert!(matches!(
            open(Cursor::new(b"From: a@b\r\n\r\nhi".to_vec())),
            Err(MailError::InvalidCompoundFile(_))
        ));
    }
}
