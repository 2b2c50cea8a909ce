//! DumpCut Core Library
//!
//! Streaming surgery on Subversion dump streams:
//! - Line source with pushback and exact raw reads
//! - Property block codec
//! - Revision/node grammar reader and the generic report driver
//! - Revision range selections
//! - Transforms (select, property edits, strip, expunge, sift,
//!   pathrename, swap, see, log, setlog)
//! - History reduction and revision renumbering

pub mod dump;
pub mod dump_format;
pub mod error;
pub mod logpatch;
pub mod properties;
pub mod reduce;
pub mod renumber;
pub mod selection;
pub mod source;
pub mod transforms;

#[cfg(test)]
mod test_support;

pub use dump::{DumpSource, Passthrough, ReportOptions, ReportStats, Transform};
pub use dump_format::{NodeAction, NodeKind, NodeRecord, Position};
pub use error::{CutterError, Result};
pub use logpatch::{Log, LogEntry, LogPatch, SetLog};
pub use properties::PropertyBlock;
pub use reduce::reduce;
pub use renumber::Renumberer;
pub use selection::{HEAD, Selection};
pub use source::LineSource;
pub use transforms::{
    Expunge, PathRename, PropDel, PropRename, PropSet, PropertyAssignment, PropertyRename, See,
    Sift, Strip, Swap, select,
};
