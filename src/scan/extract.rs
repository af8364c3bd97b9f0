//! Listing extractor: pulls raw auction entry tokens out of a scan document.
//!
//! Two document shapes exist in the wild. Older addon exports write one Lua
//! table entry per line; newer full-scan files inline every tuple into a
//! handful of very long lines. Both shapes share the same entry grammar, so
//! both strategies feed the same downstream parser.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;

/// Start of an item link inside an entry tuple.
pub const ITEM_LINK_MARKER: &str = "|Hitem:";

/// One auction tuple: from the opening brace of the item link through the
/// trailing `false` is-bid flag that terminates every tuple. Lazy middle, so
/// each match stops at the first sentinel. The regex crate matches in linear
/// time, which stands in for the original's hard 10s regex timeout.
const ENTRY_PATTERN: &str =
    r#"(?s)\{"\|c[0-9a-fA-F]{8}\|Hitem:\d+:[^|]*\|h\[[^\]]*\]\|h\|r".*?,false"#;

const TIMESTAMP_PATTERN: &str = r"(ImageUpdated|LastFullScan)\s*=\s*(\d+)";

fn entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ENTRY_PATTERN).expect("entry pattern is valid"))
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TIMESTAMP_PATTERN).expect("timestamp pattern is valid"))
}

/// Undo the addon's Lua string escaping so the entry grammar sees plain
/// quotes and braces.
pub fn unescape(raw: &str) -> String {
    raw.replace("\\\"", "\"").replace("\\{", "{").replace("\\}", "}")
}

/// First embedded scan time in the document, as Unix seconds. The addon
/// writes it under either key depending on version. Absence is non-fatal;
/// the caller falls back to wall-clock time.
pub fn scan_timestamp(raw: &str) -> Option<i64> {
    timestamp_regex()
        .captures(raw)
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Whole document is one blob of comma-delimited tuples.
    Bulk,
    /// One candidate entry per line; each line unescaped independently.
    Lines,
}

impl DocumentShape {
    /// Guess the shape of an uploaded document: a line carrying more than one
    /// item link means the tuples are inlined (bulk form).
    pub fn detect(raw: &str) -> Self {
        for line in raw.lines() {
            let links = line.matches(ITEM_LINK_MARKER).count();
            if links >= 2 {
                return DocumentShape::Bulk;
            }
            if links == 1 {
                return DocumentShape::Lines;
            }
        }
        DocumentShape::Bulk
    }
}

/// Lazy stream of raw entry tokens. Finite, non-restartable; yields each
/// maximal substring recognized as one item-link-bearing tuple.
pub struct Entries {
    inner: Inner,
}

enum Inner {
    Bulk {
        buf: String,
        pos: usize,
        done: bool,
    },
    Lines {
        buf: String,
        pos: usize,
        pending: VecDeque<String>,
    },
}

/// Stream the entry tokens of `raw` under the given strategy.
pub fn entries(raw: &str, shape: DocumentShape) -> Entries {
    let inner = match shape {
        DocumentShape::Bulk => Inner::Bulk {
            buf: unescape(raw),
            pos: 0,
            done: false,
        },
        DocumentShape::Lines => Inner::Lines {
            buf: raw.to_string(),
            pos: 0,
            pending: VecDeque::new(),
        },
    };
    Entries { inner }
}

impl Iterator for Entries {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match &mut self.inner {
            Inner::Bulk { buf, pos, done } => {
                if *done {
                    return None;
                }
                match entry_regex().find_at(buf, *pos) {
                    Some(m) => {
                        *pos = m.end();
                        Some(m.as_str().to_string())
                    }
                    None => {
                        *done = true;
                        None
                    }
                }
            }
            Inner::Lines { buf, pos, pending } => loop {
                if let Some(tok) = pending.pop_front() {
                    return Some(tok);
                }
                if *pos >= buf.len() {
                    return None;
                }
                let rest = &buf[*pos..];
                let (line, advance) = match rest.find('\n') {
                    Some(nl) => (&rest[..nl], nl + 1),
                    None => (rest, rest.len()),
                };
                *pos += advance;
                // Escaping never touches the link marker, so the raw line
                // can be screened before paying for the unescape.
                if line.contains(ITEM_LINK_MARKER) {
                    let normalized = unescape(line);
                    pending.extend(
                        entry_regex()
                            .find_iter(&normalized)
                            .map(|m| m.as_str().to_string()),
                    );
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(entry: &str) -> String {
        entry.replace('"', "\\\"").replace('{', "\\{").replace('}', "\\}")
    }

    fn sample_entry(item_id: i64) -> String {
        format!(
            r#"{{"|cffffffff|Hitem:{item_id}:0:0:0|h[Test Item]|h|r",{item_id},"Armor","Cloth",8,1,1,1700000000,500,10,20000,0,false"#
        )
    }

    #[test]
    fn bulk_form_yields_every_tuple() {
        let doc = format!(
            "AhScanData = \"{},{}\" ImageUpdated = 1700001234",
            escaped(&sample_entry(100)),
            escaped(&sample_entry(200)),
        );
        let toks: Vec<String> = entries(&doc, DocumentShape::Bulk).collect();
        assert_eq!(toks.len(), 2);
        assert!(toks[0].contains("|Hitem:100:"));
        assert!(toks[1].contains("|Hitem:200:"));
        assert!(toks.iter().all(|t| t.ends_with(",false")));
    }

    #[test]
    fn line_form_yields_tuples_per_line() {
        let doc = format!(
            "header = 1\n{}\nnoise line\n{}\n",
            escaped(&sample_entry(100)),
            escaped(&sample_entry(200)),
        );
        let toks: Vec<String> = entries(&doc, DocumentShape::Lines).collect();
        assert_eq!(toks.len(), 2);
        assert!(toks[0].contains("|Hitem:100:"));
        assert!(toks[1].contains("|Hitem:200:"));
    }

    #[test]
    fn unescape_restores_quotes_and_braces() {
        assert_eq!(unescape(r#"\{\"x\"\}"#), r#"{"x"}"#);
    }

    #[test]
    fn captures_scan_timestamp_under_either_key() {
        assert_eq!(scan_timestamp("ImageUpdated = 1700001234"), Some(1700001234));
        assert_eq!(scan_timestamp("LastFullScan=42"), Some(42));
        assert_eq!(scan_timestamp("nothing here"), None);
    }

    #[test]
    fn shape_detection() {
        let bulk = format!("{},{}", escaped(&sample_entry(1)), escaped(&sample_entry(2)));
        assert_eq!(DocumentShape::detect(&bulk), DocumentShape::Bulk);

        let lines = format!("{}\n{}", escaped(&sample_entry(1)), escaped(&sample_entry(2)));
        assert_eq!(DocumentShape::detect(&lines), DocumentShape::Lines);

        assert_eq!(DocumentShape::detect("no links at all"), DocumentShape::Bulk);
    }

    #[test]
    fn document_without_entries_yields_nothing() {
        assert_eq!(entries("LastFullScan = 99", DocumentShape::Bulk).count(), 0);
        assert_eq!(entries("a\nb\nc", DocumentShape::Lines).count(), 0);
    }
}
