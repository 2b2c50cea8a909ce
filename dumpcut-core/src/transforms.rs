//! Transforms built on the report driver
//!
//! Each transform is a [`Transform`] implementation holding whatever state
//! its hooks need. The caller picks the [`ReportOptions`] that go with it:
//! `sift` drops revisions it empties, `see` only inspects, everything else
//! rewrites and keeps empty revisions.

use crate::dump::{DumpSource, Passthrough, ReportOptions, Transform};
use crate::dump_format::{
    self, CONTENT_LENGTH, NODE_ACTION, NODE_COPYFROM_PATH, NODE_COPYFROM_REV, NODE_PATH,
    NodeKind, NodeRecord, Position, TEXT_CONTENT_LENGTH,
};
use crate::error::{CutterError, Result};
use crate::properties::{PropertyBlock, svn_props};
use crate::selection::Selection;
use regex::bytes::{Regex, RegexSet};
use std::io::{BufRead, Write};
use std::str::FromStr;
use tracing::{debug, trace};

/// Copy the selected revisions to `out` unchanged. A selection that
/// includes revision 0 also carries the stream preamble.
pub fn select<R: BufRead, W: Write + ?Sized>(
    source: &mut DumpSource<R>,
    selection: &Selection,
    out: &mut W,
) -> Result<()> {
    debug!(%selection, "selecting");
    source.report(selection, &mut Passthrough, ReportOptions::REWRITE, out)
}

/// Delete revision properties by name.
#[derive(Debug, Clone)]
pub struct PropDel {
    names: Vec<String>,
}

impl PropDel {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for PropDel {
    fn edits_properties(&self) -> bool {
        true
    }

    fn revision_properties(&mut self, _at: &Position, props: &mut PropertyBlock) -> Result<()> {
        for name in &self.names {
            props.remove(name);
        }
        Ok(())
    }
}

/// A `name=value` argument. The value runs from the first `=` to the end
/// and may itself contain `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyAssignment {
    pub name: String,
    pub value: String,
}

impl FromStr for PropertyAssignment {
    type Err = CutterError;

    fn from_str(arg: &str) -> Result<Self> {
        match arg.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(Self {
                name: name.to_string(),
                value: value.to_string(),
            }),
            _ => Err(CutterError::Argument(format!(
                "{} (expected name=value)",
                arg
            ))),
        }
    }
}

/// Set revision properties, appending new ones after the existing keys.
#[derive(Debug, Clone)]
pub struct PropSet {
    assignments: Vec<PropertyAssignment>,
}

impl PropSet {
    pub fn new(assignments: Vec<PropertyAssignment>) -> Self {
        Self { assignments }
    }
}

impl Transform for PropSet {
    fn edits_properties(&self) -> bool {
        true
    }

    fn revision_properties(&mut self, _at: &Position, props: &mut PropertyBlock) -> Result<()> {
        for PropertyAssignment { name, value } in &self.assignments {
            props.set(name.as_str(), value.as_str());
        }
        Ok(())
    }
}

/// An `old->new` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRename {
    pub from: String,
    pub to: String,
}

impl FromStr for PropertyRename {
    type Err = CutterError;

    fn from_str(arg: &str) -> Result<Self> {
        match arg.split_once("->") {
            Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok(Self {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(CutterError::Argument(format!("{} (expected old->new)", arg))),
        }
    }
}

/// Rename revision properties in place.
#[derive(Debug, Clone)]
pub struct PropRename {
    renames: Vec<PropertyRename>,
}

impl PropRename {
    pub fn new(renames: Vec<PropertyRename>) -> Self {
        Self { renames }
    }
}

impl Transform for PropRename {
    fn edits_properties(&self) -> bool {
        true
    }

    fn revision_properties(&mut self, _at: &Position, props: &mut PropertyBlock) -> Result<()> {
        for PropertyRename { from, to } in &self.renames {
            props.rename(from, to);
        }
        Ok(())
    }
}

/// Headers that stop being true once content is replaced.
const CHECKSUM_HEADERS: &[&str] = &[
    "Text-content-md5",
    "Text-content-sha1",
    "Text-copy-source-md5",
    "Text-copy-source-sha1",
];

const DELTA_HEADERS: &[&str] = &["Text-delta", "Text-delta-base-md5", "Text-delta-base-sha1"];

/// Replace file content with a short cookie naming the revision and path.
///
/// With patterns, only nodes whose path matches every pattern are touched.
/// Symlink content (`link ...`) keeps its target and gets the cookie
/// appended, so loaders still see a valid link.
#[derive(Debug, Clone)]
pub struct Strip {
    patterns: Vec<Regex>,
}

impl Strip {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<_, _>>()?;
        Ok(Self { patterns })
    }

    fn matches(&self, path: &[u8]) -> bool {
        self.patterns.iter().all(|p| p.is_match(path))
    }
}

impl Transform for Strip {
    fn node(&mut self, at: &Position, mut node: NodeRecord) -> Result<Vec<u8>> {
        let path = node.path().unwrap_or_default().to_vec();
        if !self.matches(&path) {
            return Ok(node.into_bytes());
        }
        if !node.content.is_empty() {
            let cookie = format!(
                "Revision is {}, file path is {}.\n",
                at.revision,
                String::from_utf8_lossy(&path)
            );
            if node.content.starts_with(b"link ") {
                node.content.extend_from_slice(cookie.as_bytes());
            } else {
                node.content = cookie.into_bytes();
            }
            for name in DELTA_HEADERS {
                node.header = dump_format::remove_header(&node.header, name);
            }
            node.header = dump_format::set_length(&node.header, TEXT_CONTENT_LENGTH, node.content.len());
            node.header = dump_format::set_length(
                &node.header,
                CONTENT_LENGTH,
                node.properties.len() + node.content.len(),
            );
            trace!(revision = at.revision, index = at.index, "content stripped");
        }
        for name in CHECKSUM_HEADERS {
            node.header = dump_format::remove_header(&node.header, name);
        }
        Ok(node.into_bytes())
    }
}

fn pattern_set<S: AsRef<str>>(patterns: &[S]) -> Result<RegexSet> {
    Ok(RegexSet::new(patterns)?)
}

/// Drop every node whose path matches any of the patterns.
#[derive(Debug, Clone)]
pub struct Expunge {
    patterns: RegexSet,
}

impl Expunge {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Ok(Self {
            patterns: pattern_set(patterns)?,
        })
    }
}

impl Transform for Expunge {
    fn node(&mut self, at: &Position, node: NodeRecord) -> Result<Vec<u8>> {
        match node.path() {
            Some(path) if self.patterns.is_match(path) => {
                debug!(revision = at.revision, index = at.index, "expunged");
                Ok(Vec::new())
            }
            _ => Ok(node.into_bytes()),
        }
    }
}

/// Keep only nodes whose path matches any of the patterns. Meant to run
/// with [`ReportOptions::FILTER`].
#[derive(Debug, Clone)]
pub struct Sift {
    patterns: RegexSet,
}

impl Sift {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Ok(Self {
            patterns: pattern_set(patterns)?,
        })
    }
}

impl Transform for Sift {
    fn node(&mut self, _at: &Position, node: NodeRecord) -> Result<Vec<u8>> {
        match node.path() {
            Some(path) if self.patterns.is_match(path) => Ok(node.into_bytes()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Rewrite every `Node-path` and `Node-copyfrom-path` value in a node
/// header. `None` from `rewrite` drops the whole node.
fn map_header_paths(
    header: &[u8],
    mut rewrite: impl FnMut(&[u8]) -> Option<Vec<u8>>,
) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(header.len());
    for line in header.split_inclusive(|&b| b == b'\n') {
        let found = [NODE_PATH, NODE_COPYFROM_PATH]
            .into_iter()
            .find_map(|name| dump_format::line_value(line, name).map(|value| (name, value)));
        match found {
            Some((name, value)) => {
                let value = rewrite(value)?;
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(&value);
                out.push(b'\n');
            }
            None => out.extend_from_slice(line),
        }
    }
    Some(out)
}

/// Regex replacement on node paths, copy sources and node mergeinfo.
/// The replacement may use `$1` / `${name}` back-references.
#[derive(Debug, Clone)]
pub struct PathRename {
    pattern: Regex,
    replacement: Vec<u8>,
}

impl PathRename {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.as_bytes().to_vec(),
        })
    }

    fn rename(&self, text: &[u8]) -> Vec<u8> {
        self.pattern
            .replace_all(text, self.replacement.as_slice())
            .into_owned()
    }
}

impl Transform for PathRename {
    fn edits_properties(&self) -> bool {
        true
    }

    fn node_properties(&mut self, _at: &Position, props: &mut PropertyBlock) -> Result<()> {
        if let Some(mergeinfo) = props.get(svn_props::MERGE_INFO) {
            let renamed = self.rename(mergeinfo);
            props.set(svn_props::MERGE_INFO, renamed);
        }
        Ok(())
    }

    fn node(&mut self, _at: &Position, mut node: NodeRecord) -> Result<Vec<u8>> {
        if let Some(header) = map_header_paths(&node.header, |path| Some(self.rename(path))) {
            node.header = header;
        }
        Ok(node.into_bytes())
    }
}

const SYNTHETIC_LOG: &str = "Synthetic branch-structure creation.\n";

/// Stands in for the first node of r1 when swapping.
const SYNTHETIC_LAYOUT: &[u8] = b"Node-path: branches
Node-kind: dir
Node-action: add
Prop-content-length: 10
Content-length: 10

PROPS-END


Node-path: tags
Node-kind: dir
Node-action: add
Prop-content-length: 10
Content-length: 10

PROPS-END


Node-path: trunk
Node-kind: dir
Node-action: add
Prop-content-length: 10
Content-length: 10

PROPS-END

";

/// Exchange the first two components of a path. Single-component paths
/// have nothing to swap with.
fn swap_components(path: &[u8]) -> Option<Vec<u8>> {
    let mut parts: Vec<&[u8]> = path.split(|&b| b == b'/').collect();
    if parts.len() < 2 {
        return None;
    }
    parts.swap(0, 1);
    Some(parts.join(&b'/'))
}

/// Swap path components in each `/path:ranges` line of a mergeinfo value.
fn swap_mergeinfo(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for line in value.split_inclusive(|&b| b == b'\n') {
        let Some(colon) = line.iter().rposition(|&b| b == b':') else {
            out.extend_from_slice(line);
            continue;
        };
        let (path, ranges) = line.split_at(colon);
        let rooted = path.strip_prefix(b"/");
        match swap_components(rooted.unwrap_or(path)) {
            Some(swapped) => {
                if rooted.is_some() {
                    out.push(b'/');
                }
                out.extend_from_slice(&swapped);
                out.extend_from_slice(ranges);
            }
            None => out.extend_from_slice(line),
        }
    }
    out
}

/// Turn a `project/trunk` layout into `trunk/project`.
///
/// Nodes on single-component paths are dropped. The first node of r1 is
/// taken to be the first project directory and replaced by creations of
/// `branches`, `tags` and `trunk`.
#[derive(Debug, Default)]
pub struct Swap {
    layout_written: bool,
}

impl Swap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform for Swap {
    fn edits_properties(&self) -> bool {
        true
    }

    fn revision_properties(&mut self, at: &Position, props: &mut PropertyBlock) -> Result<()> {
        if at.revision == 1 && props.contains(svn_props::LOG) {
            props.set(svn_props::LOG, SYNTHETIC_LOG);
        }
        Ok(())
    }

    fn node_properties(&mut self, _at: &Position, props: &mut PropertyBlock) -> Result<()> {
        if let Some(mergeinfo) = props.get(svn_props::MERGE_INFO) {
            let swapped = swap_mergeinfo(mergeinfo);
            props.set(svn_props::MERGE_INFO, swapped);
        }
        Ok(())
    }

    fn node(&mut self, at: &Position, node: NodeRecord) -> Result<Vec<u8>> {
        if at.revision == 1 && !self.layout_written {
            self.layout_written = true;
            return Ok(SYNTHETIC_LAYOUT.to_vec());
        }
        match map_header_paths(&node.header, swap_components) {
            Some(header) => Ok(NodeRecord { header, ..node }.into_bytes()),
            None => {
                trace!(revision = at.revision, index = at.index, "single-component path dropped");
                Ok(Vec::new())
            }
        }
    }
}

/// Print one summary line per node instead of the stream. Meant to run
/// with [`ReportOptions::INSPECT`].
pub struct See<W> {
    out: W,
}

impl<W: Write> See<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Transform for See<W> {
    fn node(&mut self, at: &Position, node: NodeRecord) -> Result<Vec<u8>> {
        let is_dir = node.kind() == Some(NodeKind::Dir);
        let slash = if is_dir { "/" } else { "" };
        let lossy = |value: Option<&[u8]>| String::from_utf8_lossy(value.unwrap_or_default()).into_owned();

        let mut path = format!("{}{}", lossy(node.path()), slash);
        let mut action = lossy(node.header_value(NODE_ACTION));
        if let (Some(from_rev), Some(from_path)) = (
            node.header_value(NODE_COPYFROM_REV),
            node.header_value(NODE_COPYFROM_PATH),
        ) {
            path.push_str(&format!(
                " from {}:{}{}",
                lossy(Some(from_rev)),
                lossy(Some(from_path)),
                slash
            ));
            action = "copy".to_string();
        }
        let leader = format!("{}-{}", at.revision, at.index);
        writeln!(self.out, "{:<5} {:<8} {}", leader, action, path)?;
        Ok(Vec::new())
    }
}
