//! Revision renumbering
//!
//! Renumbers revisions densely from a base, rewriting every reference to
//! an old number on the way: `Node-copyfrom-rev` headers and the revision
//! ranges inside `svn:mergeinfo` values. This does not go through the
//! report driver because mergeinfo is free text inside a property block,
//! not a header.

use crate::dump_format::{
    self, CONTENT_LENGTH, NODE_COPYFROM_REV, PROP_CONTENT_LENGTH, REVISION_NUMBER,
    TEXT_CONTENT_LENGTH,
};
use crate::error::{CutterError, Result};
use crate::properties::{PropertyBlock, svn_props};
use crate::source::LineSource;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

/// Old-to-new revision map, filled as `Revision-number:` lines go by.
#[derive(Debug, Clone)]
pub struct Renumberer {
    base: u64,
    next: u64,
    map: BTreeMap<u64, u64>,
}

impl Renumberer {
    pub fn new(base: u64) -> Self {
        Self {
            base,
            next: base,
            map: BTreeMap::new(),
        }
    }

    pub fn mapping(&self) -> &BTreeMap<u64, u64> {
        &self.map
    }

    fn assign(&mut self, old: u64) -> Result<u64> {
        let new = self.next;
        self.next = new.checked_add(1).ok_or_else(|| {
            CutterError::Argument(format!(
                "renumbering from base {} runs past the largest revision number",
                self.base
            ))
        })?;
        self.map.insert(old, new);
        debug!(old, new, "renumbered");
        Ok(new)
    }

    /// New number for `old`. A revision that never appeared in the stream
    /// takes the number of the closest earlier one, since its tree is the
    /// same.
    pub fn lookup(&self, old: u64) -> u64 {
        if let Some(&new) = self.map.get(&old) {
            return new;
        }
        let fallback = self
            .map
            .range(..old)
            .next_back()
            .map(|(_, &new)| new)
            .unwrap_or(self.base);
        warn!(old, fallback, "reference to a revision not in the stream");
        fallback
    }

    /// Rewrite every decimal run in the range part of each mergeinfo line.
    fn rewrite_mergeinfo(&self, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(value.len());
        for line in value.split_inclusive(|&b| b == b'\n') {
            let split = line.iter().rposition(|&b| b == b':').map_or(0, |i| i + 1);
            let (path, ranges) = line.split_at(split);
            out.extend_from_slice(path);
            let mut digits = Vec::new();
            for &b in ranges {
                if b.is_ascii_digit() {
                    digits.push(b);
                    continue;
                }
                self.flush_digits(&mut digits, &mut out);
                out.push(b);
            }
            self.flush_digits(&mut digits, &mut out);
        }
        out
    }

    fn flush_digits(&self, digits: &mut Vec<u8>, out: &mut Vec<u8>) {
        if digits.is_empty() {
            return;
        }
        match dump_format::parse_number(digits) {
            Some(old) => out.extend_from_slice(self.lookup(old).to_string().as_bytes()),
            None => out.extend_from_slice(digits),
        }
        digits.clear();
    }

    /// Header lines up to and including the terminating blank line, with
    /// copy-source revisions mapped.
    fn read_header<R: BufRead>(&self, source: &mut LineSource<R>, first: Vec<u8>) -> Result<Vec<u8>> {
        let mut header = first;
        loop {
            let line = source.read_line()?;
            if line.is_empty() {
                return Err(CutterError::UnexpectedEof {
                    line: source.line_number(),
                    context: "record header",
                });
            }
            let copy_source = dump_format::line_value(&line, NODE_COPYFROM_REV)
                .and_then(dump_format::parse_number);
            match copy_source {
                Some(old) => header.extend(format!("{}: {}\n", NODE_COPYFROM_REV, self.lookup(old)).into_bytes()),
                None => header.extend_from_slice(&line),
            }
            if line == b"\n" {
                return Ok(header);
            }
        }
    }

    /// Copy a record's property block and content, fixing lengths if the
    /// mergeinfo rewrite changed the block.
    fn write_record<R: BufRead, W: Write + ?Sized>(
        &self,
        source: &mut LineSource<R>,
        mut header: Vec<u8>,
        out: &mut W,
    ) -> Result<()> {
        let mut properties = Vec::new();
        if dump_format::header_value(&header, PROP_CONTENT_LENGTH).is_some() {
            let (mut props, raw) = PropertyBlock::read(source)?;
            properties = raw;
            if let Some(mergeinfo) = props.get(svn_props::MERGE_INFO) {
                let rewritten = self.rewrite_mergeinfo(mergeinfo);
                if rewritten != mergeinfo {
                    props.set(svn_props::MERGE_INFO, rewritten);
                    properties = props.to_bytes();
                }
            }
        }

        let mut content = Vec::new();
        if let Some(len) = dump_format::header_number(&header, TEXT_CONTENT_LENGTH) {
            let len = usize::try_from(len).map_err(|_| {
                CutterError::grammar(source.line_number(), "text content length overflows")
            })?;
            content = source.read_exact(len)?;
        }

        if dump_format::header_number(&header, PROP_CONTENT_LENGTH) != Some(properties.len() as u64)
            && !properties.is_empty()
        {
            header = dump_format::set_length(&header, PROP_CONTENT_LENGTH, properties.len());
            header = dump_format::set_length(&header, CONTENT_LENGTH, properties.len() + content.len());
        }
        out.write_all(&header)?;
        out.write_all(&properties)?;
        out.write_all(&content)?;
        Ok(())
    }

    /// Renumber the whole stream from `source` into `out`.
    pub fn run<R: BufRead, W: Write + ?Sized>(
        &mut self,
        source: &mut LineSource<R>,
        out: &mut W,
    ) -> Result<()> {
        loop {
            let line = source.read_line()?;
            if line.is_empty() {
                break;
            }
            if let Some(old) =
                dump_format::line_value(&line, REVISION_NUMBER).and_then(dump_format::parse_number)
            {
                let new = self.assign(old)?;
                let first = format!("{}: {}\n", REVISION_NUMBER, new).into_bytes();
                let header = self.read_header(source, first)?;
                self.write_record(source, header, out)?;
            } else if line.starts_with(b"Node-path: ") {
                let header = self.read_header(source, line)?;
                self.write_record(source, header, out)?;
            } else {
                out.write_all(&line)?;
            }
        }
        info!(revisions = self.map.len(), base = self.base, "renumbering complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use std::io::Cursor;

    fn renumber(dump: &[u8], base: u64) -> (Vec<u8>, Renumberer) {
        let mut renumberer = Renumberer::new(base);
        let mut source = LineSource::new(Cursor::new(dump.to_vec()));
        let mut out = Vec::new();
        renumberer.run(&mut source, &mut out).unwrap();
        (out, renumberer)
    }

    #[test]
    fn test_dense_stream_is_unchanged() {
        let (out, renumberer) = renumber(MULTI_REVISION, 0);
        assert_eq!(text(&out), text(MULTI_REVISION));
        assert!(renumberer.mapping().iter().all(|(old, new)| old == new));
    }

    #[test]
    fn test_sparse_stream() {
        let (out, renumberer) = renumber(SPARSE, 0);
        let expected: Vec<(u64, u64)> = vec![(0, 0), (3, 1), (7, 2), (12, 3)];
        let mapping: Vec<(u64, u64)> = renumberer.mapping().iter().map(|(&o, &n)| (o, n)).collect();
        assert_eq!(mapping, expected);

        let got = text(&out);
        let revisions: Vec<&str> = got
            .lines()
            .filter(|l| l.starts_with("Revision-number: "))
            .collect();
        // The file content in r3 is not a header and is left alone.
        assert_eq!(
            revisions,
            vec![
                "Revision-number: 0",
                "Revision-number: 1",
                "Revision-number: 99",
                "Revision-number: 2",
                "Revision-number: 3",
            ]
        );
        assert!(got.contains("Node-copyfrom-rev: 1\nNode-copyfrom-path: trunk\n"));
        assert!(got.contains("K 13\nsvn:mergeinfo\nV 29\n/branches/b1:2-3\n/vendor:1,2*\nPROPS-END\n"));
        assert!(got.contains("K 10\nsvn:ignore\nV 4\n*.o\n\n"));
        assert_lengths(&out);
    }

    #[test]
    fn test_copy_sources_stay_behind_copier() {
        let (out, _) = renumber(MULTI_REVISION, 100);
        let mut current = 0;
        for line in text(&out).lines() {
            if let Some(rev) = line.strip_prefix("Revision-number: ") {
                current = rev.parse().unwrap();
            }
            if let Some(from) = line.strip_prefix("Node-copyfrom-rev: ") {
                let from: u64 = from.parse().unwrap();
                assert!(from <= current, "copy from r{} in r{}", from, current);
            }
        }
        assert!(text(&out).contains("Revision-number: 112\n"));
        assert!(text(&out).contains("/trunk:102-103"));
        assert_lengths(&out);
    }

    #[test]
    fn test_base_near_limit_is_rejected() {
        let (_, renumberer) = renumber(TWO_REVISIONS, u64::MAX - 3);
        assert_eq!(renumberer.mapping().get(&2), Some(&(u64::MAX - 1)));

        let mut renumberer = Renumberer::new(u64::MAX - 1);
        let mut out = Vec::new();
        let result = renumberer.run(&mut LineSource::new(Cursor::new(TWO_REVISIONS.to_vec())), &mut out);
        assert!(matches!(result, Err(CutterError::Argument(_))));
    }

    #[test]
    fn test_unknown_revision_falls_back() {
        let mut renumberer = Renumberer::new(5);
        renumberer.assign(2).unwrap();
        renumberer.assign(9).unwrap();
        assert_eq!(renumberer.lookup(9), 6);
        assert_eq!(renumberer.lookup(4), 5);
        assert_eq!(renumberer.lookup(40), 6);
        assert_eq!(renumberer.lookup(1), 5);
        assert_eq!(
            renumberer.rewrite_mergeinfo(b"/a:b:2-9\n/c:4*"),
            b"/a:b:5-6\n/c:5*".to_vec()
        );
    }
}
