use regex::Regex;

/// Whether a token opens or closes an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
}

/// One structural tag occurrence with its byte span in the document.
///
/// `start` is the offset of the `<`, `end` is one past the `>`, so the
/// element's inner markup begins at an open token's `end`.
#[derive(Debug, Clone)]
pub struct TagToken<'a> {
    /// Lowercased element name.
    pub name: String,
    pub kind: TagKind,
    pub start: usize,
    pub end: usize,
    /// Raw attribute text of an open tag, empty for close tags.
    pub attrs: &'a str,
}

/// Scans a document for a fixed set of element names and yields their
/// open/close tags in order, with byte offsets. Markup between the
/// configured tags is ignored, so malformed fragments cannot abort a
/// scan; they simply produce no tokens.
pub struct TagScanner {
    re_tag: Regex,
}

impl TagScanner {
    pub fn new(names: &[&str]) -> Self {
        let alternation = names.join("|");
        let pattern = format!(r"(?is)<(/?)\s*({alternation})\b([^>]*)>");
        Self {
            re_tag: Regex::new(&pattern).expect("valid tag pattern"),
        }
    }

    /// All occurrences of the configured tags, in document order.
    pub fn scan<'a>(&self, doc: &'a str) -> Vec<TagToken<'a>> {
        self.re_tag
            .captures_iter(doc)
            .map(|caps| {
                let whole = caps.get(0).expect("whole match");
                let kind = if caps.get(1).is_some_and(|m| !m.as_str().is_empty()) {
                    TagKind::Close
                } else {
                    TagKind::Open
                };
                let attrs = match kind {
                    TagKind::Open => caps.get(3).map_or("", |m| m.as_str()),
                    TagKind::Close => "",
                };
                TagToken {
                    name: caps
                        .get(2)
                        .expect("tag name")
                        .as_str()
                        .to_ascii_lowercase(),
                    kind,
                    start: whole.start(),
                    end: whole.end(),
                    attrs,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_tags_in_order_with_offsets() {
        let doc = r#"<ul><li class="x">one</li><li>two</li></ul>"#;
        let scanner = TagScanner::new(&["ul", "ol", "li"]);
        let tokens = scanner.scan(doc);

        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0].name, "ul");
        assert_eq!(tokens[0].kind, TagKind::Open);
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 4);
        assert_eq!(tokens[1].name, "li");
        assert_eq!(tokens[1].attrs, r#" class="x""#);
        assert_eq!(tokens[2].kind, TagKind::Close);
        assert_eq!(&doc[tokens[1].end..tokens[2].start], "one");
        assert_eq!(tokens[5].name, "ul");
        assert_eq!(tokens[5].kind, TagKind::Close);
    }

    #[test]
    fn ignores_unconfigured_and_similar_names() {
        let doc = "<link href=\"x\"><line><ul><html></ul>";
        let scanner = TagScanner::new(&["ul", "ol", "li"]);
        let tokens = scanner.scan(doc);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "ul");
        assert_eq!(tokens[1].name, "ul");
    }

    #[test]
    fn matches_case_insensitively() {
        let doc = "<UL><LI>x</LI></UL>";
        let scanner = TagScanner::new(&["ul", "ol", "li"]);
        let tokens = scanner.scan(doc);
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].name, "ul");
        assert_eq!(tokens[1].name, "li");
    }

    #[test]
    fn headings_with_attributes() {
        let doc = r#"<h2 id="History">History</h2><h3 id="Rome">Rome</h3>"#;
        let scanner = TagScanner::new(&["h2", "h3"]);
        let tokens = scanner.scan(doc);
        assert_eq!(tokens.len(), 4);
        assert!(tokens[0].attrs.contains(r#"id="History""#));
        assert_eq!(tokens[2].name, "h3");
    }
}
