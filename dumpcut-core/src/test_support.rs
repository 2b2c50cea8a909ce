//! Dump fixtures shared by the unit tests

/// r1 adds trunk/a.txt ("hi\n"), r2 copies it to trunk/b.txt from r1.
pub const TWO_REVISIONS: &[u8] = include_bytes!("../tests/data/two_revisions.dump");

/// r0..r12: directory layout, plain edits, a branch copy, a binary add,
/// a mergeinfo change, a run of plain edits and a delete.
pub const MULTI_REVISION: &[u8] = include_bytes!("../tests/data/multi.dump");

/// Revisions 0, 3, 7 and 12 only, with a copy and a mergeinfo property.
pub const SPARSE: &[u8] = include_bytes!("../tests/data/sparse.dump");

/// `svn log` listing matching the authors of MULTI_REVISION.
pub const MULTI_LOG: &[u8] = include_bytes!("../tests/data/multi.log");

/// The bytes of revision `rev`, from its header up to the next revision
/// header or the end of the dump.
pub fn span(dump: &[u8], rev: u64) -> &[u8] {
    let marker = format!("Revision-number: {}\n", rev);
    let start = find(dump, marker.as_bytes(), 0).expect("revision present in fixture");
    let end = find(dump, b"Revision-number: ", start + marker.len()).unwrap_or(dump.len());
    &dump[start..end]
}

pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

pub fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn header_length(header: &str, name: &str) -> Option<usize> {
    let prefix = format!("{}: ", name);
    header
        .lines()
        .find_map(|l| l.strip_prefix(prefix.as_str()))
        .map(|v| v.parse().expect("numeric length header"))
}

/// Walk every revision and node record of `dump` and check its length
/// headers against the bytes that follow: `Prop-content-length` must end
/// exactly at `PROPS-END`, `Content-length` must be the sum of the
/// property and text lengths, and the next record must start right after
/// the content.
pub fn assert_lengths(dump: &[u8]) {
    let mut pos = 0;
    while pos < dump.len() {
        let line_end = find(dump, b"\n", pos).map_or(dump.len(), |i| i + 1);
        if !(dump[pos..].starts_with(b"Revision-number: ") || dump[pos..].starts_with(b"Node-path: ")) {
            pos = line_end;
            continue;
        }
        let first = text(&dump[pos..line_end - 1]);
        let header_end = find(dump, b"\n\n", pos)
            .unwrap_or_else(|| panic!("{}: unterminated header", first))
            + 2;
        let header = text(&dump[pos..header_end]);
        let props = header_length(&header, "Prop-content-length");
        let content = header_length(&header, "Text-content-length");
        let total = header_length(&header, "Content-length");

        let mut body = header_end;
        if let Some(len) = props {
            assert!(body + len <= dump.len(), "{}: Prop-content-length {} runs past the end", first, len);
            let block = &dump[body..body + len];
            assert!(
                block.ends_with(b"PROPS-END\n") && find(block, b"PROPS-END\n", 0) == Some(len - 10),
                "{}: Prop-content-length {} does not end at PROPS-END",
                first,
                len
            );
            body += len;
        }
        body += content.unwrap_or(0);
        assert!(body <= dump.len(), "{}: Text-content-length runs past the end", first);
        assert_eq!(
            total.unwrap_or(0),
            props.unwrap_or(0) + content.unwrap_or(0),
            "{}: Content-length",
            first
        );

        pos = body;
        while dump.get(pos) == Some(&b'\n') {
            pos += 1;
        }
        let rest = &dump[pos..];
        assert!(
            rest.is_empty() || rest.starts_with(b"Revision-number: ") || rest.starts_with(b"Node-path: "),
            "{}: content is followed by {:?}",
            first,
            text(&rest[..rest.len().min(40)])
        );
    }
}
