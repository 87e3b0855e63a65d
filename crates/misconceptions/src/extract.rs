use regex::Regex;
use tracing::{debug, warn};

use crate::clean::TextCleaner;
use crate::scan::{TagKind, TagScanner};

/// Heading anchors that never yield content regions. Matched
/// case-sensitively against the full anchor.
pub const SECTION_DENYLIST: &[&str] = &[
    "References",
    "See_also",
    "Notes",
    "External_links",
    "Further_reading",
    "Citations",
    "Sources",
    "Bibliography",
    "Footnotes",
];

/// Items must carry more than this many characters once cleaned.
const MIN_TEXT_CHARS: usize = 20;

/// Cross-page navigation stubs rendered as list items.
const REJECT_PREFIXES: &[&str] = &["Main article:", "See also:"];

/// A heading-delimited slice of the document body. The slice runs from
/// the heading's own start to the next heading's start, so regions are
/// ordered and non-overlapping. The preamble before the first heading
/// forms a region with an empty section.
#[derive(Debug, Clone)]
pub struct Region<'a> {
    pub section: String,
    pub subsection: Option<String>,
    pub body: &'a str,
}

/// Why a candidate list item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooShort,
    NavigationalStub,
    SubEnumerationArtifact,
}

/// Splits a document into heading-delimited regions by scanning h2 and
/// h3 tags positionally. An h3 inherits the most recent h2 as parent;
/// denylisted headings produce no region but still terminate the one
/// before them, and a denylisted h2 takes its h3 children with it.
pub struct SectionWalker {
    scanner: TagScanner,
    re_attr_id: Regex,
    re_span_id: Regex,
    re_editsection: Regex,
}

struct RawHeading {
    level: u8,
    start: usize,
    title: String,
    anchor: String,
}

impl SectionWalker {
    pub fn new() -> Self {
        Self {
            scanner: TagScanner::new(&["h2", "h3"]),
            // The id key must follow whitespace or start the attribute
            // list; `data-id` never supplies an anchor.
            re_attr_id: Regex::new(r#"(?:^|\s)id\s*=\s*"([^"]+)""#).expect("valid regex"),
            re_span_id: Regex::new(r#"(?is)<span\b[^>]*\sid\s*=\s*"([^"]+)""#)
                .expect("valid regex"),
            re_editsection: Regex::new(r#"(?is)<span\b[^>]*class="[^"]*mw-editsection[^"]*".*$"#)
                .expect("valid regex"),
        }
    }

    pub fn walk<'a>(&self, doc: &'a str, cleaner: &TextCleaner) -> Vec<Region<'a>> {
        let headings = self.collect_headings(doc, cleaner);
        let mut regions = Vec::new();

        let first_start = headings.first().map_or(doc.len(), |h| h.start);
        if !doc[..first_start].trim().is_empty() {
            regions.push(Region {
                section: String::new(),
                subsection: None,
                body: &doc[..first_start],
            });
        }

        let mut current_section = String::new();
        let mut section_denied = false;
        for (idx, heading) in headings.iter().enumerate() {
            let end = headings.get(idx + 1).map_or(doc.len(), |next| next.start);
            let denied = SECTION_DENYLIST.contains(&heading.anchor.as_str());
            if heading.level == 2 {
                current_section = heading.title.clone();
                section_denied = denied;
                if !denied {
                    regions.push(Region {
                        section: heading.title.clone(),
                        subsection: None,
                        body: &doc[heading.start..end],
                    });
                }
            } else if !denied && !section_denied {
                regions.push(Region {
                    section: current_section.clone(),
                    subsection: Some(heading.title.clone()),
                    body: &doc[heading.start..end],
                });
            }
        }
        regions
    }

    fn collect_headings(&self, doc: &str, cleaner: &TextCleaner) -> Vec<RawHeading> {
        let tokens = self.scanner.scan(doc);
        let mut headings = Vec::new();

        for (idx, token) in tokens.iter().enumerate() {
            if token.kind != TagKind::Open {
                continue;
            }
            let close = tokens[idx + 1..]
                .iter()
                .find(|t| t.kind == TagKind::Close && t.name == token.name);
            let Some(close) = close else {
                warn!(name = %token.name, offset = token.start, "unclosed heading, skipping");
                continue;
            };
            let inner = &doc[token.end..close.start];
            let title_markup = self.re_editsection.replace(inner, "");
            let title = cleaner.clean(&title_markup);
            // Anchor comes from the heading tag itself or from the
            // headline span in older markup; derive from the title as
            // a last resort.
            let anchor = self
                .re_attr_id
                .captures(token.attrs)
                .or_else(|| self.re_span_id.captures(inner))
                .map(|caps| caps[1].to_string())
                .unwrap_or_else(|| title.replace(' ', "_"));
            let level = if token.name == "h2" { 2 } else { 3 };
            headings.push(RawHeading {
                level,
                start: token.start,
                title,
                anchor,
            });
        }
        headings
    }
}

/// Walks the list structure of one region and yields the cleaned text
/// of each accepted top-level item.
pub struct ListExtractor {
    scanner: TagScanner,
}

struct Capture {
    start: usize,
    cut: Option<usize>,
}

impl ListExtractor {
    pub fn new() -> Self {
        Self {
            scanner: TagScanner::new(&["ul", "ol", "li"]),
        }
    }

    /// Items of depth-1 lists only. An item is truncated at its first
    /// nested list; an unclosed item ends at the next sibling item or
    /// at the enclosing list's close.
    pub fn extract_items(&self, body: &str, cleaner: &TextCleaner) -> Vec<String> {
        let tokens = self.scanner.scan(body);
        let mut raw_items: Vec<(usize, usize)> = Vec::new();
        let mut depth = 0usize;
        let mut open: Option<Capture> = None;

        for token in &tokens {
            match (token.name.as_str(), token.kind) {
                ("ul" | "ol", TagKind::Open) => {
                    if let Some(capture) = open.as_mut() {
                        if capture.cut.is_none() {
                            capture.cut = Some(token.start);
                        }
                    }
                    depth += 1;
                }
                ("ul" | "ol", TagKind::Close) => {
                    if depth == 1 {
                        if let Some(capture) = open.take() {
                            raw_items.push(item_span(capture, token.start));
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                ("li", TagKind::Open) => {
                    if depth == 1 {
                        if let Some(capture) = open.take() {
                            raw_items.push(item_span(capture, token.start));
                        }
                        open = Some(Capture {
                            start: token.end,
                            cut: None,
                        });
                    }
                }
                ("li", TagKind::Close) => {
                    if depth == 1 {
                        if let Some(capture) = open.take() {
                            raw_items.push(item_span(capture, token.start));
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some(capture) = open.take() {
            raw_items.push(item_span(capture, body.len()));
        }

        let mut items = Vec::new();
        for (start, end) in raw_items {
            let text = cleaner.clean(&body[start..end]);
            match rejection_reason(&text) {
                None => items.push(text),
                Some(reason) => {
                    let excerpt: String = text.chars().take(40).collect();
                    debug!(?reason, text = %excerpt, "rejected list item");
                }
            }
        }
        items
    }
}

fn item_span(capture: Capture, close_at: usize) -> (usize, usize) {
    (capture.start, capture.cut.unwrap_or(close_at))
}

/// Applies the acceptance rules to a cleaned item text.
pub fn rejection_reason(text: &str) -> Option<RejectReason> {
    if text.chars().count() <= MIN_TEXT_CHARS {
        return Some(RejectReason::TooShort);
    }
    if REJECT_PREFIXES.iter().any(|p| text.starts_with(p)) {
        return Some(RejectReason::NavigationalStub);
    }
    if is_sub_enumeration(text) {
        return Some(RejectReason::SubEnumerationArtifact);
    }
    None
}

// Leading markers like "a. " belong to sub-items that lost their
// parent context during truncation.
fn is_sub_enumeration(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_lowercase() && bytes[1] == b'.' && bytes[2] == b' '
}
