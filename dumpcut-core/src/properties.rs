//! SVN property blocks
//!
//! A property block is an ordered list of `K <len>\n<key>\n V <len>\n<value>\n`
//! pairs closed by `PROPS-END\n`. Order is significant: a block that is
//! read and written back unchanged must come out byte-identical, so the
//! pairs are kept in a `Vec` rather than a map.

use crate::error::{CutterError, Result};
use crate::source::LineSource;
use std::io::BufRead;

/// Sentinel line closing every property block.
pub const PROPS_END: &[u8] = b"PROPS-END\n";

/// Ordered property list for a revision or a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBlock {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl PropertyBlock {
    /// Create a new empty property block
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a block from the stream, returning it together with the exact
    /// bytes consumed.
    pub fn read<R: BufRead>(source: &mut LineSource<R>) -> Result<(Self, Vec<u8>)> {
        let mut block = PropertyBlock::new();
        let mut raw = Vec::new();
        loop {
            let next = source.peek()?;
            if next.is_empty() {
                return Err(CutterError::UnexpectedEof {
                    line: source.line_number(),
                    context: "property block",
                });
            }
            if next.starts_with(b"PROPS-END") {
                break;
            }
            raw.extend(source.require("K")?);
            let key_line = source.read_line()?;
            raw.extend_from_slice(&key_line);
            let key = key_line.strip_suffix(b"\n").unwrap_or(&key_line).to_vec();

            let value_header = source.require("V")?;
            let len = parse_length(&value_header, source.line_number())?;
            raw.extend(value_header);
            let value = source.read_exact(len)?;
            raw.extend_from_slice(&value);
            raw.extend(source.require("\n")?);

            block.set(key, value);
        }
        raw.extend(source.flush());
        Ok((block, raw))
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(k, _)| k == name.as_bytes())
            .map(|(_, v)| v.as_slice())
    }

    /// Get a property value as text, if it is valid UTF-8
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Set a property value. New keys go to the end; existing keys keep
    /// their position.
    pub fn set(&mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove a property
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let idx = self.entries.iter().position(|(k, _)| k == name.as_bytes())?;
        Some(self.entries.remove(idx).1)
    }

    /// Rename a property in place. Returns false if `from` is absent.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let Some(idx) = self.entries.iter().position(|(k, _)| k == from.as_bytes()) else {
            return false;
        };
        if from != to {
            if let Some(clash) = self.entries.iter().position(|(k, _)| k == to.as_bytes()) {
                self.entries.remove(clash);
            }
            let idx = self
                .entries
                .iter()
                .position(|(k, _)| k == from.as_bytes())
                .unwrap_or(idx);
            self.entries[idx].0 = to.as_bytes().to_vec();
        }
        true
    }

    /// Check if property exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Property names in block order
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|(k, _)| k.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize back to dump grammar.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.entries {
            out.extend_from_slice(format!("K {}\n", key.len()).as_bytes());
            out.extend_from_slice(key);
            out.push(b'\n');
            out.extend_from_slice(format!("V {}\n", value.len()).as_bytes());
            out.extend_from_slice(value);
            out.push(b'\n');
        }
        out.extend_from_slice(PROPS_END);
        out
    }
}

fn parse_length(line: &[u8], line_number: u64) -> Result<usize> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| CutterError::grammar(line_number, "bad length in property header"))
}

/// SVN standard properties
pub mod svn_props {
    /// Commit author
    pub const AUTHOR: &str = "svn:author";

    /// Commit date
    pub const DATE: &str = "svn:date";

    /// Commit message
    pub const LOG: &str = "svn:log";

    /// Merge info
    pub const MERGE_INFO: &str = "svn:mergeinfo";

    /// Stand-in author used by `svn log` when a revision has none
    pub const NO_AUTHOR: &str = "(no author)";
}
