//! SVN dump stream parser and the generic filter driver
//!
//! `DumpSource` knows the dump grammar: revision headers, node records,
//! property blocks and length-prefixed content. `DumpSource::report` is
//! the driver nearly every transform is built on: it walks the stream
//! once, hands each record to a [`Transform`], and writes whatever the
//! transform returns, keeping every length header consistent.

use crate::dump_format::{
    self, CONTENT_LENGTH, NODE_COPYFROM_PATH, NODE_COPYFROM_REV, NodeRecord, Position,
    PROP_CONTENT_LENGTH, REVISION_NUMBER, TEXT_CONTENT_LENGTH,
};
use crate::error::{CutterError, Result};
use crate::properties::PropertyBlock;
use crate::selection::Selection;
use crate::source::LineSource;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{BufRead, Seek, Write};
use tracing::{debug, trace};

pub const REVISION_PREFIX: &str = "Revision-number:";
const NODE_PREFIX: &[u8] = b"Node-";

/// Per-record hooks applied by [`DumpSource::report`].
///
/// Property hooks see the parsed block of every revision header (selected
/// or not, since the header has to be parsed either way) and of every
/// node that has one. The node hook gets the full record and returns the
/// bytes to emit; an empty vector drops the node.
pub trait Transform {
    /// Whether the property hooks may change anything. When false, blocks
    /// pass through verbatim and length headers are left alone.
    fn edits_properties(&self) -> bool {
        false
    }

    fn revision_properties(&mut self, _at: &Position, _props: &mut PropertyBlock) -> Result<()> {
        Ok(())
    }

    fn node_properties(&mut self, _at: &Position, _props: &mut PropertyBlock) -> Result<()> {
        Ok(())
    }

    fn node(&mut self, _at: &Position, node: NodeRecord) -> Result<Vec<u8>> {
        Ok(node.into_bytes())
    }
}

/// Transform that changes nothing.
#[derive(Debug, Default)]
pub struct Passthrough;

impl Transform for Passthrough {}

/// Output behaviour of [`DumpSource::report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Write surviving records to the output
    pub passthrough: bool,

    /// Keep revisions that carry no nodes at all
    pub pass_empty: bool,
}

impl ReportOptions {
    /// Rewrite the stream, keeping empty revisions.
    pub const REWRITE: Self = Self {
        passthrough: true,
        pass_empty: true,
    };

    /// Rewrite the stream, dropping revisions left without nodes.
    pub const FILTER: Self = Self {
        passthrough: true,
        pass_empty: false,
    };

    /// Walk the stream for the hooks' side effects only.
    pub const INSPECT: Self = Self {
        passthrough: false,
        pass_empty: true,
    };
}

/// Counters for one run
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReportStats {
    pub revisions_read: u64,
    pub revisions_emitted: u64,
    pub nodes_read: u64,
    pub nodes_emitted: u64,
}

/// Grammar-aware reader over a dump stream.
pub struct DumpSource<R> {
    lines: LineSource<R>,
    revision: u64,
    index: usize,
    emitted: HashSet<u64>,
    stats: ReportStats,
}

impl<R: BufRead> DumpSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineSource::new(reader),
            revision: 0,
            index: 0,
            emitted: HashSet::new(),
            stats: ReportStats::default(),
        }
    }

    /// The underlying line source.
    pub fn lines(&mut self) -> &mut LineSource<R> {
        &mut self.lines
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn position(&self) -> Position {
        Position {
            revision: self.revision,
            index: self.index,
        }
    }

    /// Revisions whose header has been written to the output.
    pub fn emitted_revisions(&self) -> &HashSet<u64> {
        &self.emitted
    }

    pub fn stats(&self) -> &ReportStats {
        &self.stats
    }

    /// Read a revision header and its property block, applying the
    /// transform's revision-property hook. Trailing blank lines are
    /// folded into the returned bytes.
    pub fn read_revision_header(&mut self, transform: &mut dyn Transform) -> Result<Vec<u8>> {
        let mut stash = self.lines.require(REVISION_PREFIX)?;
        self.revision = dump_format::line_value(&stash, REVISION_NUMBER)
            .and_then(dump_format::parse_number)
            .ok_or_else(|| {
                CutterError::grammar(
                    self.lines.line_number(),
                    format!("invalid revision number in {:?}", String::from_utf8_lossy(&stash)),
                )
            })?;
        self.index = 0;
        self.stats.revisions_read += 1;
        debug!(revision = self.revision, "revision header");

        stash.extend(self.lines.require("Prop-content-length:")?);
        stash.extend(self.lines.require("Content-length:")?);
        stash.extend(self.lines.require("\n")?);

        let (mut props, raw) = PropertyBlock::read(&mut self.lines)?;
        if transform.edits_properties() {
            let at = self.position();
            transform.revision_properties(&at, &mut props)?;
            let serialized = props.to_bytes();
            stash = dump_format::set_length(&stash, PROP_CONTENT_LENGTH, serialized.len());
            stash = dump_format::set_length(&stash, CONTENT_LENGTH, serialized.len());
            stash.extend(serialized);
        } else {
            stash.extend(raw);
        }

        while self.lines.peek()? == b"\n" {
            stash.extend(self.lines.read_line()?);
        }
        Ok(stash)
    }

    /// Read one node record: header block, optional property block and
    /// optional raw content.
    pub fn read_node(&mut self, transform: &mut dyn Transform) -> Result<NodeRecord> {
        let mut header = self.lines.require("Node-")?;
        loop {
            let line = self.lines.read_line()?;
            if line.is_empty() {
                return Err(CutterError::UnexpectedEof {
                    line: self.lines.line_number(),
                    context: "node header",
                });
            }
            let source_rev = dump_format::line_value(&line, NODE_COPYFROM_REV)
                .and_then(dump_format::parse_number);
            if let Some(rev) = source_rev {
                if !self.emitted.contains(&rev) {
                    // Keep the source path glued to its revision line.
                    header.extend(line);
                    header.extend(self.lines.require(NODE_COPYFROM_PATH)?);
                    continue;
                }
            }
            let done = line == b"\n";
            header.extend(line);
            if done {
                break;
            }
        }
        self.stats.nodes_read += 1;

        let edits = transform.edits_properties();
        let mut properties = Vec::new();
        if dump_format::header_value(&header, PROP_CONTENT_LENGTH).is_some() {
            let (mut props, raw) = PropertyBlock::read(&mut self.lines)?;
            properties = if edits {
                let at = self.position();
                transform.node_properties(&at, &mut props)?;
                props.to_bytes()
            } else {
                raw
            };
        }

        let mut content = Vec::new();
        if let Some(len) = dump_format::header_number(&header, TEXT_CONTENT_LENGTH) {
            let len = usize::try_from(len).map_err(|_| {
                CutterError::grammar(self.lines.line_number(), "text content length overflows")
            })?;
            content = self.lines.read_exact(len)?;
        }

        if edits {
            header = dump_format::set_length(&header, PROP_CONTENT_LENGTH, properties.len());
            header = dump_format::set_length(&header, CONTENT_LENGTH, properties.len() + content.len());
        }
        trace!(
            revision = self.revision,
            index = self.index,
            props = properties.len(),
            content = content.len(),
            "node read"
        );
        Ok(NodeRecord {
            header,
            properties,
            content,
        })
    }

    /// Accumulate raw lines until one starts with `prefix`; that line is
    /// pushed back, not consumed.
    pub fn read_until_next(&mut self, prefix: &str) -> Result<Vec<u8>> {
        let mut stash = Vec::new();
        loop {
            let line = self.lines.read_line()?;
            if line.is_empty() {
                return Ok(stash);
            }
            if line.starts_with(prefix.as_bytes()) {
                self.lines.push(line)?;
                return Ok(stash);
            }
            stash.extend(line);
        }
    }

    /// Consume the rest of an excluded revision record by record, so that
    /// node content is never mistaken for a header.
    fn skip_revision_body(&mut self) -> Result<()> {
        loop {
            let (done, blank, node) = {
                let next = self.lines.peek()?;
                (
                    next.is_empty() || next.starts_with(REVISION_PREFIX.as_bytes()),
                    next == b"\n",
                    next.starts_with(NODE_PREFIX),
                )
            };
            if done {
                return Ok(());
            }
            if blank {
                self.lines.flush();
            } else if node {
                self.read_node(&mut Passthrough)?;
            } else {
                let line = self.lines.flush();
                return Err(CutterError::grammar(
                    self.lines.line_number(),
                    format!(
                        "unexpected line in revision {}: {:?}",
                        self.revision,
                        String::from_utf8_lossy(&line)
                    ),
                ));
            }
        }
    }

    /// Write record bytes. When `with_header` is set the bytes open with the
    /// current revision's header, which is then recorded as emitted.
    fn say<W: Write + ?Sized>(&mut self, out: &mut W, text: &[u8], with_header: bool) -> Result<()> {
        if with_header {
            self.emitted.insert(self.revision);
            self.stats.revisions_emitted += 1;
        }
        out.write_all(text)?;
        Ok(())
    }

    /// Run `transform` over every revision in `selection`.
    ///
    /// A revision header is only written together with its first surviving
    /// node, so revisions whose nodes are all dropped vanish from the
    /// output. Revisions that had no nodes to begin with are kept when
    /// `options.pass_empty` is set. Reading stops as soon as the stream
    /// passes the selection's upper bound.
    pub fn report<W: Write + ?Sized>(
        &mut self,
        selection: &Selection,
        transform: &mut dyn Transform,
        options: ReportOptions,
        out: &mut W,
    ) -> Result<()> {
        let mut emit = options.passthrough && selection.contains(0);
        let preamble = self.read_until_next(REVISION_PREFIX)?;
        if emit {
            out.write_all(&preamble)?;
        }
        if !self.lines.has_buffered() {
            return Ok(());
        }

        loop {
            let mut stash = self.read_revision_header(transform)?;
            let mut nodes_seen = 0usize;

            if !selection.contains(self.revision) {
                if self.revision > selection.upper_bound() {
                    debug!(revision = self.revision, "past end of selection");
                    return Ok(());
                }
                self.skip_revision_body()?;
                if !self.lines.has_buffered() {
                    return Ok(());
                }
                continue;
            }

            loop {
                let line = self.lines.read_line()?;
                if line.is_empty() {
                    if nodes_seen == 0 && options.pass_empty && options.passthrough {
                        self.say(out, &stash, true)?;
                    }
                    return Ok(());
                }
                if line == b"\n" {
                    if options.passthrough && emit {
                        out.write_all(&line)?;
                    }
                    continue;
                }
                if line.starts_with(REVISION_PREFIX.as_bytes()) {
                    self.lines.push(line)?;
                    if nodes_seen == 0 && options.pass_empty && options.passthrough {
                        self.say(out, &stash, true)?;
                    }
                    break;
                }
                if line.starts_with(NODE_PREFIX) {
                    nodes_seen += 1;
                    if line.starts_with(b"Node-path: ") {
                        self.index += 1;
                    }
                    self.lines.push(line)?;
                    let node = self.read_node(transform)?;
                    let at = self.position();
                    let mut text = transform.node(&at, node)?;
                    emit = !text.is_empty();
                    let with_header = emit && !stash.is_empty();
                    if with_header {
                        let mut joined = std::mem::take(&mut stash);
                        joined.extend(text);
                        text = joined;
                    }
                    if options.passthrough && emit {
                        self.stats.nodes_emitted += 1;
                        self.say(out, &text, with_header)?;
                    }
                    continue;
                }
                return Err(CutterError::grammar(
                    self.lines.line_number(),
                    format!(
                        "unexpected line in revision {}: {:?}",
                        self.revision,
                        String::from_utf8_lossy(&line)
                    ),
                ));
            }
        }
    }
}

impl<R: BufRead + Seek> DumpSource<R> {
    /// Start over from the top of a seekable input. Counters restart too,
    /// so stats describe the last pass only.
    pub fn rewind(&mut self) -> Result<()> {
        self.lines.rewind()?;
        self.revision = 0;
        self.index = 0;
        self.emitted.clear();
        self.stats = ReportStats::default();
        Ok(())
    }
}
