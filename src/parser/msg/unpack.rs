//! Decode a [`DirectoryTree`] into a tree of property records.

use std::collections::BTreeMap;

use super::directory::{DirectoryTree, NodeKind};
use super::property::{
    decode_multiple_element, parse_fixed_entries, PropertyTable, PropertyValue,
};
use super::tags::{PropertyType, StreamName, PROPERTIES_STREAM};

/// Properties of one storage plus its classified child storages.
///
/// Built once by [`unpack`]; nothing mutates it afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnpackedRecord {
    pub props: BTreeMap<&'static str, PropertyValue>,
    pub attachments: Vec<UnpackedRecord>,
    pub recipients: Vec<UnpackedRecord>,
    pub messages: Vec<UnpackedRecord>,
}

impl UnpackedRecord {
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.props.get(name)
    }

    /// A string property, `None` when absent, not a string, or empty.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(PropertyValue::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(PropertyValue::as_bytes)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropertyValue::as_i64)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    pub fn time(&self, name: &str) -> Option<String> {
        self.get(name).and_then(PropertyValue::as_rfc2822)
    }
}

/// Length of the `__properties_version1.0` header for a storage kind.
fn properties_header_len(kind: NodeKind) -> usize {
    match kind {
        NodeKind::Root => 32,
        NodeKind::Message => 24,
        _ => 8,
    }
}

/// Unpack the whole tree starting at the root storage.
///
/// Storages nested deeper than `max_depth` are left out.
pub fn unpack(tree: &DirectoryTree, table: &dyn PropertyTable, max_depth: usize) -> UnpackedRecord {
    unpack_node(tree, DirectoryTree::ROOT, table, 0, max_depth)
}

fn unpack_node(
    tree: &DirectoryTree,
    idx: usize,
    table: &dyn PropertyTable,
    depth: usize,
    max_depth: usize,
) -> UnpackedRecord {
    let node = tree.node(idx);
    let mut record = UnpackedRecord::default();
    let mut elements: BTreeMap<(u16, u16), Vec<(u32, String)>> = BTreeMap::new();
    let mut fixed = None;

    for (name, data) in &node.streams {
        if name == PROPERTIES_STREAM {
            fixed = Some(data);
            continue;
        }
        let Some(stream) = StreamName::parse(name) else {
            tracing::trace!(stream = %name, "Not a property stream");
            continue;
        };
        let Some(info) = table.lookup(stream.id) else {
            tracing::trace!(id = stream.id, "Unknown property, skipping");
            continue;
        };

        if let (Some(i), PropertyType::Multiple(base)) = (stream.index, stream.ty) {
            if let Some(value) = decode_multiple_element(base, data) {
                elements.entry((stream.id, base)).or_default().push((i, value));
            }
            continue;
        }

        let ty = match stream.ty {
            PropertyType::Unspecified => info.default_type,
            ty => ty,
        };
        record
            .props
            .insert(info.name, PropertyValue::decode(info.name, ty, data));
    }

    for ((id, _), mut values) in elements {
        if let Some(info) = table.lookup(id) {
            values.sort_by_key(|(i, _)| *i);
            record.props.insert(
                info.name,
                PropertyValue::StringArray(values.into_iter().map(|(_, v)| v).collect()),
            );
        }
    }

    if let Some(data) = fixed {
        for entry in parse_fixed_entries(data, properties_header_len(node.kind)) {
            if !entry.ty.is_fixed_width() {
                continue;
            }
            let Some(info) = table.lookup(entry.id) else {
                continue;
            };
            record
                .props
                .entry(info.name)
                .or_insert_with(|| PropertyValue::decode(info.name, entry.ty, &entry.value));
        }
    }

    for &child in &node.children {
        let kind = tree.node(child).kind;
        if !matches!(
            kind,
            NodeKind::Attachment | NodeKind::Recipient | NodeKind::Message
        ) {
            continue;
        }
        if depth >= max_depth {
            tracing::warn!(depth, storage = %tree.node(child).name, "Nesting limit reached, skipping storage");
            continue;
        }
        let sub = unpack_node(tree, child, table, depth + 1, max_depth);
        match kind {
            NodeKind::Attachment => record.attachments.push(sub),
            NodeKind::Recipient => record.recipients.push(sub),
            _ => record.messages.push(sub),
        }
    }

    record
}
