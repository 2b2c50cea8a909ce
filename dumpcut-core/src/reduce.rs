//! Topological reduction
//!
//! Keeps only the revisions that shape the history: anything that is not a
//! plain file content change, copy sources, and the neighbours of both.
//! Runs of plain edits in between are dropped. The input is read twice,
//! so it has to be seekable.

use crate::dump::{DumpSource, ReportOptions, Transform};
use crate::dump_format::{NodeAction, NodeKind, NodeRecord, Position};
use crate::error::Result;
use crate::selection::Selection;
use crate::transforms::select;
use std::collections::BTreeSet;
use std::io::{BufRead, Seek, Write};
use tracing::info;

/// Pass 1 hook: collects interesting revisions, emits nothing.
#[derive(Debug)]
struct ReduceScan {
    interesting: BTreeSet<u64>,
}

impl ReduceScan {
    fn new() -> Self {
        Self {
            interesting: BTreeSet::from([0]),
        }
    }

    fn mark_around(&mut self, revision: u64) {
        self.interesting.extend(
            [revision.checked_sub(1), Some(revision), revision.checked_add(1)]
                .into_iter()
                .flatten(),
        );
    }
}

fn is_plain_change(node: &NodeRecord) -> bool {
    node.kind() == Some(NodeKind::File) && node.action() == Some(NodeAction::Change)
}

impl Transform for ReduceScan {
    fn node(&mut self, at: &Position, node: NodeRecord) -> Result<Vec<u8>> {
        if !is_plain_change(&node) || node.has_properties() {
            self.mark_around(at.revision);
        }
        if let Some(source) = node.copy_from_rev() {
            self.mark_around(source);
        }
        Ok(Vec::new())
    }
}

/// Compute the interesting revisions of `source` and write them to `out`.
/// Returns the selection that was replayed.
pub fn reduce<R, W>(source: &mut DumpSource<R>, out: &mut W) -> Result<Selection>
where
    R: BufRead + Seek,
    W: Write + ?Sized,
{
    source.lines().ensure_seekable("reduce")?;

    let mut scan = ReduceScan::new();
    source.report(
        &Selection::all(),
        &mut scan,
        ReportOptions::INSPECT,
        &mut std::io::sink(),
    )?;
    let selection = Selection::from_revisions(scan.interesting);
    info!(%selection, "reduced selection");

    source.rewind()?;
    select(source, &selection, out)?;
    Ok(selection)
}
