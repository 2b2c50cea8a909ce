//! `svn log` listings: parsing them as patches and producing them
//!
//! A listing is a sequence of entries separated by a line of 72 dashes:
//!
//! ```text
//! ------------------------------------------------------------------------
//! r2 | bob | 2011-11-30 16:02:02 +0000 (Wed, 30 Nov 2011) | 1 line
//!
//! Tweak the README
//! ------------------------------------------------------------------------
//! ```

use crate::dump::Transform;
use crate::dump_format::Position;
use crate::error::{CutterError, Result};
use crate::properties::{PropertyBlock, svn_props};
use crate::selection::Selection;
use chrono::DateTime;
use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use tracing::{debug, info};

/// Entry separator in `svn log` output.
pub const DELIMITER: &str =
    "------------------------------------------------------------------------";

/// One entry of a log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub revision: u64,
    pub author: String,
    pub date: String,
    pub text: String,
}

/// Log entries keyed by revision.
#[derive(Debug, Clone, Default)]
pub struct LogPatch {
    entries: BTreeMap<u64, LogEntry>,
}

enum ParseState {
    AwaitingHeader,
    InEntry(LogEntry),
}

impl LogPatch {
    /// Parse a listing. Entries outside `restrict` are dropped.
    pub fn parse<R: BufRead>(reader: R, restrict: Option<&Selection>) -> Result<Self> {
        let header = Regex::new(r"^r[0-9]+")?;
        let mut patch = LogPatch::default();
        let mut state = ParseState::AwaitingHeader;

        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            let line_number = index as u64 + 1;
            state = match state {
                ParseState::InEntry(mut entry) => {
                    if line.starts_with(DELIMITER.as_bytes()) {
                        patch.finish(entry, restrict);
                        ParseState::AwaitingHeader
                    } else {
                        entry.text.push_str(&String::from_utf8_lossy(&line));
                        entry.text.push('\n');
                        ParseState::InEntry(entry)
                    }
                }
                ParseState::AwaitingHeader => {
                    if line.starts_with(b"-----------") {
                        ParseState::AwaitingHeader
                    } else if !header.is_match(&line) {
                        return Err(CutterError::LogPatch {
                            line: line_number,
                            message: "did not see a comment header where one was expected".into(),
                        });
                    } else {
                        ParseState::InEntry(parse_header(&line, line_number)?)
                    }
                }
            };
        }
        if let ParseState::InEntry(entry) = state {
            patch.finish(entry, restrict);
        }
        info!(entries = patch.entries.len(), "log patch loaded");
        Ok(patch)
    }

    fn finish(&mut self, mut entry: LogEntry, restrict: Option<&Selection>) {
        entry.text = entry.text.trim().to_string();
        if restrict.is_none_or(|sel| sel.contains(entry.revision)) {
            self.entries.insert(entry.revision, entry);
        }
    }

    pub fn get(&self, revision: u64) -> Option<&LogEntry> {
        self.entries.get(&revision)
    }

    pub fn contains(&self, revision: u64) -> bool {
        self.entries.contains_key(&revision)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_header(line: &[u8], line_number: u64) -> Result<LogEntry> {
    let line = String::from_utf8_lossy(line);
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    let malformed = |message: &str| CutterError::LogPatch {
        line: line_number,
        message: message.to_string(),
    };
    if fields.len() < 3 {
        return Err(malformed("comment header has too few fields"));
    }
    let revision = fields[0][1..]
        .parse()
        .map_err(|_| malformed("bad revision number in comment header"))?;
    Ok(LogEntry {
        revision,
        author: fields[1].to_string(),
        date: fields[2].to_string(),
        text: String::new(),
    })
}

fn author(props: &PropertyBlock) -> String {
    props
        .get(svn_props::AUTHOR)
        .map(|a| String::from_utf8_lossy(a).into_owned())
        .unwrap_or_else(|| svn_props::NO_AUTHOR.to_string())
}

/// Replace `svn:log` with the patch's text for every revision the patch
/// covers. The patch author must match the revision's author.
#[derive(Debug)]
pub struct SetLog {
    patch: LogPatch,
}

impl SetLog {
    pub fn new(patch: LogPatch) -> Self {
        Self { patch }
    }
}

impl Transform for SetLog {
    fn edits_properties(&self) -> bool {
        true
    }

    fn revision_properties(&mut self, at: &Position, props: &mut PropertyBlock) -> Result<()> {
        if !props.contains(svn_props::LOG) {
            return Ok(());
        }
        let Some(entry) = self.patch.get(at.revision) else {
            return Ok(());
        };
        let found = author(props);
        if entry.author != found {
            return Err(CutterError::AuthorMismatch {
                revision: at.revision,
                expected: entry.author.clone(),
                found,
            });
        }
        debug!(revision = at.revision, "log replaced");
        props.set(svn_props::LOG, entry.text.as_str());
        Ok(())
    }
}

/// Write an `svn log` style listing of the selected revisions. Revisions
/// with an empty or missing log message are skipped.
pub struct Log<W> {
    selection: Selection,
    out: W,
}

impl<W: Write> Log<W> {
    pub fn new(selection: Selection, out: W) -> Self {
        Self { selection, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Transform for Log<W> {
    // Hooks only run for blocks the driver is asked to edit.
    fn edits_properties(&self) -> bool {
        true
    }

    fn revision_properties(&mut self, at: &Position, props: &mut PropertyBlock) -> Result<()> {
        if !self.selection.contains(at.revision) {
            return Ok(());
        }
        let log = String::from_utf8_lossy(props.get(svn_props::LOG).unwrap_or_default());
        if log.is_empty() {
            return Ok(());
        }
        let raw_date = props.get_str(svn_props::DATE).unwrap_or_default();
        let date = DateTime::parse_from_rfc3339(raw_date).map_err(|_| CutterError::Date {
            revision: at.revision,
            value: raw_date.to_string(),
        })?;

        writeln!(self.out, "{}", DELIMITER)?;
        writeln!(
            self.out,
            "r{} | {} | {} | {} lines",
            at.revision,
            author(props),
            date.format("%Y-%m-%d %H:%M:%S +0000 (%a, %d %b %Y)"),
            log.matches('\n').count()
        )?;
        write!(self.out, "\n{}\n", log)?;
        Ok(())
    }
}
