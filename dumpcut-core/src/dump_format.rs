//! SVN dump format structures
//!
//! Records are kept as the raw bytes they were read as. The helpers here
//! give typed access to individual header lines without re-serializing
//! anything the caller did not touch.

use std::fmt;

pub const REVISION_NUMBER: &str = "Revision-number";
pub const NODE_PATH: &str = "Node-path";
pub const NODE_KIND: &str = "Node-kind";
pub const NODE_ACTION: &str = "Node-action";
pub const NODE_COPYFROM_REV: &str = "Node-copyfrom-rev";
pub const NODE_COPYFROM_PATH: &str = "Node-copyfrom-path";
pub const PROP_CONTENT_LENGTH: &str = "Prop-content-length";
pub const TEXT_CONTENT_LENGTH: &str = "Text-content-length";
pub const CONTENT_LENGTH: &str = "Content-length";

/// Where the driver currently is in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Revision number from the last `Revision-number:` header
    pub revision: u64,

    /// 1-based index of the current node within the revision (0 before
    /// the first `Node-path:`)
    pub index: usize,
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
}

impl NodeKind {
    pub fn parse(value: &[u8]) -> Option<Self> {
        match value {
            b"file" => Some(NodeKind::File),
            b"dir" => Some(NodeKind::Dir),
            _ => None,
        }
    }
}

/// Node action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Add,
    Delete,
    Replace,
    Change,
}

impl NodeAction {
    pub fn parse(value: &[u8]) -> Option<Self> {
        match value {
            b"add" => Some(NodeAction::Add),
            b"delete" => Some(NodeAction::Delete),
            b"replace" => Some(NodeAction::Replace),
            b"change" => Some(NodeAction::Change),
            _ => None,
        }
    }
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeAction::Add => "add",
            NodeAction::Delete => "delete",
            NodeAction::Replace => "replace",
            NodeAction::Change => "change",
        };
        f.write_str(name)
    }
}

/// One node record as read from the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRecord {
    /// Header lines including the terminating blank line
    pub header: Vec<u8>,

    /// Serialized property block, empty if the node has none
    pub properties: Vec<u8>,

    /// Raw text content
    pub content: Vec<u8>,
}

impl NodeRecord {
    pub fn header_value(&self, name: &str) -> Option<&[u8]> {
        header_value(&self.header, name)
    }

    pub fn path(&self) -> Option<&[u8]> {
        self.header_value(NODE_PATH)
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.header_value(NODE_KIND).and_then(NodeKind::parse)
    }

    pub fn action(&self) -> Option<NodeAction> {
        self.header_value(NODE_ACTION).and_then(NodeAction::parse)
    }

    pub fn copy_from_rev(&self) -> Option<u64> {
        header_number(&self.header, NODE_COPYFROM_REV)
    }

    pub fn copy_from_path(&self) -> Option<&[u8]> {
        self.header_value(NODE_COPYFROM_PATH)
    }

    pub fn has_properties(&self) -> bool {
        !self.properties.is_empty()
    }

    /// Concatenate header, properties and content for output.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut all = self.header;
        all.reserve(self.properties.len() + self.content.len());
        all.extend(self.properties);
        all.extend(self.content);
        all
    }
}

/// Split a header blob into lines, terminators included.
fn lines(header: &[u8]) -> impl Iterator<Item = &[u8]> {
    header.split_inclusive(|&b| b == b'\n')
}

/// Value of the first `name: value` line in `header`.
pub fn header_value<'a>(header: &'a [u8], name: &str) -> Option<&'a [u8]> {
    lines(header).find_map(|line| line_value(line, name))
}

/// Value of a single line if it is a `name: value` header line.
pub fn line_value<'a>(line: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let rest = line.strip_prefix(name.as_bytes())?.strip_prefix(b": ")?;
    Some(rest.strip_suffix(b"\n").unwrap_or(rest))
}

/// Numeric value of a header, if present and well-formed.
pub fn header_number(header: &[u8], name: &str) -> Option<u64> {
    header_value(header, name).and_then(parse_number)
}

pub fn parse_number(value: &[u8]) -> Option<u64> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

/// Replace the value of every `name: ...` line. Headers that do not
/// carry the line are returned unchanged.
pub fn set_header(header: &[u8], name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.len() + value.len());
    for line in lines(header) {
        if line_value(line, name).is_some() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.push(b'\n');
        } else {
            out.extend_from_slice(line);
        }
    }
    out
}

/// Rewrite a length header to `len`.
pub fn set_length(header: &[u8], name: &str, len: usize) -> Vec<u8> {
    set_header(header, name, len.to_string().as_bytes())
}

/// Drop every line starting with `name:`.
pub fn remove_header(header: &[u8], name: &str) -> Vec<u8> {
    let mut prefix = name.as_bytes().to_vec();
    prefix.push(b':');
    lines(header)
        .filter(|line| !line.starts_with(&prefix))
        .flatten()
        .copied()
        .collect()
}
