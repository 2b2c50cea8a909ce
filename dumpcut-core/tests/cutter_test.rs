//! End-to-end tests over the dump fixtures in tests/data

use dumpcut_core::{
    CutterError, DumpSource, Expunge, LineSource, Passthrough, PropertyBlock, Renumberer,
    ReportOptions, Selection, Strip, reduce, select,
};
use proptest::prelude::*;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

#[path = "../src/test_support.rs"]
#[allow(dead_code)]
mod test_support;

use test_support::{MULTI_REVISION, SPARSE, TWO_REVISIONS, assert_lengths, text};

fn select_str(dump: &[u8], selection: &str) -> Vec<u8> {
    let mut source = DumpSource::new(Cursor::new(dump.to_vec()));
    let mut out = Vec::new();
    select(&mut source, &selection.parse().unwrap(), &mut out).unwrap();
    out
}

#[test]
#[should_panic(expected = "Prop-content-length 107 does not end at PROPS-END")]
fn test_length_check_rejects_bad_prop_length() {
    let corrupted = text(TWO_REVISIONS).replacen(
        "Revision-number: 1\nProp-content-length: 108\n",
        "Revision-number: 1\nProp-content-length: 107\n",
        1,
    );
    assert_lengths(corrupted.as_bytes());
}

#[test]
#[should_panic(expected = "Content-length")]
fn test_length_check_rejects_bad_content_length() {
    let corrupted = text(TWO_REVISIONS).replacen(
        "Text-content-length: 3\nContent-length: 3\n",
        "Text-content-length: 3\nContent-length: 4\n",
        1,
    );
    assert_lengths(corrupted.as_bytes());
}

#[test]
fn test_fixtures_have_consistent_lengths() {
    for dump in [TWO_REVISIONS, MULTI_REVISION, SPARSE] {
        assert_lengths(dump);
    }
}

#[test]
fn test_full_selection_is_identity() {
    for dump in [TWO_REVISIONS, MULTI_REVISION, SPARSE] {
        assert_eq!(select_str(dump, "0:HEAD"), dump);
    }
}

#[test]
fn test_two_revision_scenario() {
    let first = text(&select_str(TWO_REVISIONS, "1:1"));
    assert!(first.starts_with("Revision-number: 1\n"));
    assert!(first.contains("Text-content-length: 3\nContent-length: 3\n\nhi\n"));
    assert!(!first.contains("Revision-number: 2"));
    assert!(!first.contains("trunk/b.txt"));

    let second = text(&select_str(TWO_REVISIONS, "2:2"));
    assert!(second.starts_with("Revision-number: 2\n"));
    assert!(second.contains("Node-copyfrom-rev: 1\nNode-copyfrom-path: trunk/a.txt\n"));
    assert!(!second.contains("Revision-number: 1"));

    let mut joined = text(&select_str(TWO_REVISIONS, "0"));
    joined.push_str(&first);
    joined.push_str(&second);
    assert_eq!(joined, text(TWO_REVISIONS));
}

#[test]
fn test_selection_spans_concatenate() {
    let pieces = ["0:3", "4:6", "7:HEAD"];
    let mut joined = Vec::new();
    for piece in pieces {
        joined.extend(select_str(MULTI_REVISION, piece));
    }
    assert_eq!(text(&joined), text(MULTI_REVISION));
}

#[test]
fn test_reduce_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(MULTI_REVISION).unwrap();
    file.flush().unwrap();

    let handle = file.reopen().unwrap();
    let mut source = DumpSource::new(BufReader::new(handle));
    let mut out = Vec::new();
    let kept = reduce(&mut source, &mut out).unwrap();
    assert_eq!(kept.to_string(), "0:7,10:12");
    assert_lengths(&out);

    // Only the replay pass is counted.
    let stats = serde_json::to_value(source.stats()).unwrap();
    assert_eq!(stats["revisions_read"], 13);
    assert_eq!(stats["revisions_emitted"], 11);
}

struct Pipe(Cursor<Vec<u8>>);

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for Pipe {
    fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
        Err(std::io::Error::other("illegal seek"))
    }
}

#[test]
fn test_reduce_rejects_pipes_before_reading() {
    let mut source = DumpSource::new(BufReader::new(Pipe(Cursor::new(MULTI_REVISION.to_vec()))));
    let mut out = Vec::new();
    let result = reduce(&mut source, &mut out);
    assert!(matches!(result, Err(CutterError::NotSeekable(_))));
    assert!(out.is_empty());
    assert_eq!(source.stats().revisions_read, 0);
}

#[test]
fn test_expunge_then_renumber() {
    let mut expunge = Expunge::new(&["^trunk/README$"]).unwrap();
    let mut source = DumpSource::new(Cursor::new(MULTI_REVISION.to_vec()));
    let mut expunged = Vec::new();
    source
        .report(&Selection::all(), &mut expunge, ReportOptions::REWRITE, &mut expunged)
        .unwrap();

    let mut renumberer = Renumberer::new(0);
    let mut renumbered = Vec::new();
    renumberer
        .run(&mut LineSource::new(Cursor::new(expunged)), &mut renumbered)
        .unwrap();

    // r0, r1, r4, r5, r6 and r11 survive.
    let old: Vec<u64> = renumberer.mapping().keys().copied().collect();
    assert_eq!(old, vec![0, 1, 4, 5, 6, 11]);
    let got = text(&renumbered);
    assert!(got.contains("Revision-number: 5\n"));
    assert!(!got.contains("Revision-number: 6\n"));
    // The branch copied from r3, which is gone; r1 is the closest earlier one.
    assert!(got.contains("Node-copyfrom-rev: 1\nNode-copyfrom-path: trunk\n"));
    assert!(got.contains("/trunk:1-1"));
    assert_lengths(&renumbered);
}

#[test]
fn test_strip_keeps_lengths_consistent() {
    let mut strip = Strip::new::<&str>(&[]).unwrap();
    let mut source = DumpSource::new(Cursor::new(MULTI_REVISION.to_vec()));
    let mut out = Vec::new();
    source
        .report(&Selection::all(), &mut strip, ReportOptions::REWRITE, &mut out)
        .unwrap();
    assert!(out.len() != MULTI_REVISION.len());
    assert_lengths(&out);
}

#[test]
fn test_garbage_between_records_reports_line() {
    let mut dump = TWO_REVISIONS.to_vec();
    dump.extend_from_slice(
        b"Revision-number: 3\nProp-content-length: 10\nContent-length: 10\n\nPROPS-END\n\nstray text\n",
    );
    let mut source = DumpSource::new(Cursor::new(dump));
    let err = source
        .report(&Selection::all(), &mut Passthrough, ReportOptions::REWRITE, &mut Vec::new())
        .unwrap_err();
    assert!(err.to_string().contains("stray text"), "{}", err);
}

#[derive(Debug, Clone)]
struct Node {
    path: String,
    props: Vec<(String, Vec<u8>)>,
    content: Option<Vec<u8>>,
}

fn arb_node() -> impl Strategy<Value = Node> {
    (
        "[a-z]{1,8}(/[a-z]{1,8}){0,2}",
        proptest::option::of(proptest::collection::vec(
            ("[a-z:]{1,10}", proptest::collection::vec(any::<u8>(), 0..24)),
            0..3,
        )),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..64)),
    )
        .prop_map(|(path, props, content)| Node {
            path,
            props: props.unwrap_or_default(),
            content,
        })
}

fn render(revisions: &[Vec<Node>]) -> Vec<u8> {
    let mut dump = b"SVN-fs-dump-format-version: 2\n\n".to_vec();
    for (number, nodes) in revisions.iter().enumerate() {
        let mut rev_props = PropertyBlock::new();
        rev_props.set("svn:log", format!("r{}", number));
        let block = rev_props.to_bytes();
        dump.extend(
            format!(
                "Revision-number: {}\nProp-content-length: {}\nContent-length: {}\n\n",
                number,
                block.len(),
                block.len()
            )
            .into_bytes(),
        );
        dump.extend(block);
        dump.push(b'\n');
        for node in nodes {
            dump.extend(format!("Node-path: {}\nNode-kind: file\nNode-action: add\n", node.path).into_bytes());
            let mut props = PropertyBlock::new();
            for (k, v) in &node.props {
                props.set(k.as_str(), v.clone());
            }
            let block = props.to_bytes();
            let content = node.content.clone().unwrap_or_default();
            dump.extend(format!("Prop-content-length: {}\n", block.len()).into_bytes());
            if node.content.is_some() {
                dump.extend(format!("Text-content-length: {}\n", content.len()).into_bytes());
            }
            dump.extend(format!("Content-length: {}\n\n", block.len() + content.len()).into_bytes());
            dump.extend(block);
            dump.extend(content);
            dump.extend_from_slice(b"\n\n");
        }
    }
    dump
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_generated_streams_roundtrip(
        revisions in proptest::collection::vec(proptest::collection::vec(arb_node(), 0..4), 1..6)
    ) {
        let dump = render(&revisions);
        assert_lengths(&dump);
        prop_assert_eq!(select_str(&dump, "0:HEAD"), dump.clone());

        let mut renumberer = Renumberer::new(0);
        let mut out = Vec::new();
        renumberer.run(&mut LineSource::new(Cursor::new(dump.clone())), &mut out).unwrap();
        assert_lengths(&out);
        prop_assert_eq!(out, dump);
    }
}
