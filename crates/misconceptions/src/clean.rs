use regex::Regex;

// Private-use sentinels bracketing held-out formula spans while the
// tag and entity passes run. Stripped from input up front and never
// produced by entity decoding, so page markup cannot forge one.
const HOLD_OPEN: char = '\u{E000}';
const HOLD_CLOSE: char = '\u{E001}';

/// Turns rendered page markup into plain prose.
///
/// TeX formulas are carried through as `$...$` spans: math elements
/// with a TeX annotation are replaced before any tag removal, and the
/// formula text is held out of the later passes so stripping and
/// entity decoding never touch it. Re-cleaning prior output is safe:
/// stripped text has no tags left to remove, and held formulas are
/// re-held rather than decoded further.
pub struct TextCleaner {
    re_math: Regex,
    re_tex: Regex,
    re_noncontent: Regex,
    re_ref_marker: Regex,
    re_mono: Regex,
    re_img: Regex,
    re_tag: Regex,
    re_entity: Regex,
    re_hold: Regex,
    re_formula_span: Regex,
    re_ws: Regex,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self {
            re_math: Regex::new(r"(?is)<math\b[^>]*>.*?</math>").expect("valid regex"),
            re_tex: Regex::new(
                r#"(?is)<annotation[^>]*encoding="application/x-tex"[^>]*>(.*?)</annotation>"#,
            )
            .expect("valid regex"),
            re_noncontent: Regex::new(
                r"(?is)<style\b[^>]*>.*?</style>|<script\b[^>]*>.*?</script>",
            )
            .expect("valid regex"),
            re_ref_marker: Regex::new(
                r#"(?is)<sup\b[^>]*class="[^"]*(?:reference|noprint)[^"]*"[^>]*>.*?</sup>"#,
            )
            .expect("valid regex"),
            re_mono: Regex::new(r"(?i)</?(?:code|tt|samp|kbd|var)\b[^>]*>").expect("valid regex"),
            re_img: Regex::new(r"(?i)<img\b[^>]*>").expect("valid regex"),
            re_tag: Regex::new(r"(?s)</?[a-zA-Z][^<>]*>").expect("valid regex"),
            re_entity: Regex::new(r"&(#[xX]?[0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);")
                .expect("valid regex"),
            re_hold: Regex::new(r"\x{E000}([0-9]+)\x{E001}").expect("valid regex"),
            re_formula_span: Regex::new(r"\$[^$\n\x{E000}]*\$").expect("valid regex"),
            re_ws: Regex::new(r"\s+").expect("valid regex"),
        }
    }

    /// Full cleaning pipeline: math normalization, marker and
    /// non-content removal, tag stripping, entity decoding, whitespace
    /// collapse.
    pub fn clean(&self, raw: &str) -> String {
        let raw = raw.replace([HOLD_OPEN, HOLD_CLOSE], "");
        let mut held: Vec<String> = Vec::new();

        let mut text = self.hold_math(&raw, &mut held);
        text = self.hold_formula_spans(&text, &mut held);
        text = self.re_noncontent.replace_all(&text, "").into_owned();
        text = self.re_ref_marker.replace_all(&text, "").into_owned();
        text = self.re_math.replace_all(&text, "").into_owned();
        text = self.re_mono.replace_all(&text, "").into_owned();
        text = self.re_img.replace_all(&text, "").into_owned();
        text = self.re_tag.replace_all(&text, "").into_owned();
        text = self.decode_entities(&text);
        text = self.restore_held(&text, &held);
        self.re_ws.replace_all(&text, " ").trim().to_string()
    }

    /// Decodes named (`&amp;` `&lt;` `&gt;` `&quot;` `&apos;` `&nbsp;`)
    /// and numeric (`&#931;`, `&#xA9;`) references in one left-to-right
    /// pass. Doubly-encoded text resolves one level per call, so
    /// `&amp;lt;` becomes `&lt;`, not `<`.
    pub fn decode_entities(&self, text: &str) -> String {
        self.re_entity
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let name = caps.get(1).expect("entity name").as_str();
                decode_entity(name).unwrap_or_else(|| {
                    caps.get(0).expect("whole match").as_str().to_string()
                })
            })
            .into_owned()
    }

    fn tex_formula(&self, element: &str) -> Option<String> {
        let caps = self.re_tex.captures(element)?;
        let body = caps.get(1).expect("annotation body").as_str();
        Some(self.decode_entities(body).trim().to_string())
    }

    fn hold_math(&self, raw: &str, held: &mut Vec<String>) -> String {
        self.re_math
            .replace_all(raw, |caps: &regex::Captures<'_>| {
                let element = caps.get(0).expect("whole match").as_str();
                match self.tex_formula(element) {
                    Some(formula) => {
                        let idx = held.len();
                        held.push(format!("${formula}$"));
                        format!(" {HOLD_OPEN}{idx}{HOLD_CLOSE} ")
                    }
                    None => element.to_string(),
                }
            })
            .into_owned()
    }

    // Already-delimited formulas must survive re-cleaning untouched. A
    // span containing a complete tag is not a formula (dollar amounts
    // with markup in between) and stays subject to stripping.
    fn hold_formula_spans(&self, text: &str, held: &mut Vec<String>) -> String {
        self.re_formula_span
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let span = caps.get(0).expect("whole match").as_str();
                if self.re_tag.is_match(span) {
                    return span.to_string();
                }
                let idx = held.len();
                held.push(span.to_string());
                format!("{HOLD_OPEN}{idx}{HOLD_CLOSE}")
            })
            .into_owned()
    }

    fn restore_held(&self, text: &str, held: &[String]) -> String {
        if held.is_empty() {
            return text.to_string();
        }
        self.re_hold
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let idx: usize = caps[1].parse().expect("placeholder index");
                held.get(idx).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(rest) = name.strip_prefix('#') {
        let code = if let Some(hex) = rest.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            rest.parse::<u32>().ok()?
        };
        // The hold sentinels never decode; encoded references to them
        // stay literal text.
        return char::from_u32(code)
            .filter(|c| *c != HOLD_OPEN && *c != HOLD_CLOSE)
            .map(|c| c.to_string());
    }
    let replacement = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        _ => return None,
    };
    Some(replacement.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TextCleaner {
        TextCleaner::new()
    }

    #[test]
    fn normalizes_annotated_math() {
        let raw = r#"The equation <span class="mw-math-element"><math xmlns="http://www.w3.org/1998/Math/MathML"><semantics><mrow><mi>E</mi></mrow><annotation encoding="application/x-tex">E=mc^2</annotation></semantics></math></span> is famous."#;
        assert_eq!(
            cleaner().clean(raw),
            "The equation $E=mc^2$ is famous."
        );
    }

    #[test]
    fn math_entities_decode_inside_formula() {
        let raw = r#"<math><annotation encoding="application/x-tex">a &lt; b &amp;&amp; c</annotation></math>"#;
        assert_eq!(cleaner().clean(raw), "$a < b && c$");
    }

    #[test]
    fn formula_content_survives_later_passes() {
        let raw = r#"Note <math><annotation encoding="application/x-tex">x &lt; y &amp; z</annotation></math> holds<sup class="reference">[4]</sup>."#;
        let cleaned = cleaner().clean(raw);
        assert_eq!(cleaned, "Note $x < y & z$ holds.");
        assert_eq!(cleaner().clean(&cleaned), cleaned);
    }

    #[test]
    fn annotationless_math_removed() {
        let raw = "before <math><mrow><mi>x</mi></mrow></math> after";
        assert_eq!(cleaner().clean(raw), "before after");
    }

    #[test]
    fn reference_markers_removed_with_content() {
        let raw = r##"Napoleon<sup id="cite_ref-1" class="reference"><a href="#cite_note-1">&#91;1&#93;</a></sup> was average height."##;
        assert_eq!(cleaner().clean(raw), "Napoleon was average height.");
    }

    #[test]
    fn citation_needed_template_removed() {
        let raw = r#"Claim<sup class="noprint Inline-Template Template-Fact">[<i>citation needed</i>]</sup> continues here."#;
        assert_eq!(cleaner().clean(raw), "Claim continues here.");
    }

    #[test]
    fn plain_superscripts_keep_their_text() {
        let raw = "The 20<sup>th</sup> century.";
        assert_eq!(cleaner().clean(raw), "The 20th century.");
    }

    #[test]
    fn style_blocks_removed_with_content() {
        let raw = r#"<style data-mw-deduplicate="TemplateStyles:r123">.c{color:red}</style>Visible text only here."#;
        assert_eq!(cleaner().clean(raw), "Visible text only here.");
    }

    #[test]
    fn monospace_unwrapped() {
        let raw = "Run <code>cargo build</code> and <tt>make</tt> tools.";
        assert_eq!(cleaner().clean(raw), "Run cargo build and make tools.");
    }

    #[test]
    fn images_removed() {
        let raw = r#"Before<img src="pic.png" alt="a diagram"> after."#;
        assert_eq!(cleaner().clean(raw), "Before after.");
    }

    #[test]
    fn entities_decoded() {
        let c = cleaner();
        assert_eq!(c.clean("Fish &amp; chips"), "Fish & chips");
        assert_eq!(c.clean("sigma is &#931;"), "sigma is Σ");
        assert_eq!(c.clean("copyright &#xA9; then"), "copyright © then");
        assert_eq!(c.clean("unknown &foobar; stays"), "unknown &foobar; stays");
    }

    #[test]
    fn double_encoded_entities_resolve_one_level() {
        assert_eq!(cleaner().decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn entity_encoded_sentinels_stay_literal() {
        let c = cleaner();
        let raw = r#"Formula <math><annotation encoding="application/x-tex">e^x</annotation></math> then &#57344;0&#57345; text."#;
        assert_eq!(c.clean(raw), "Formula $e^x$ then &#57344;0&#57345; text.");
        assert_eq!(
            c.clean("plain &#xE000;7&#xE001; stays"),
            "plain &#xE000;7&#xE001; stays"
        );
    }

    #[test]
    fn whitespace_collapsed_and_trimmed() {
        let raw = "  a\t\tb\n\nc&nbsp;d  ";
        assert_eq!(cleaner().clean(raw), "a b c d");
    }

    #[test]
    fn dollar_amounts_with_markup_between_still_stripped() {
        let raw = "Prices rose from $5 <b>quickly</b> to $10.";
        assert_eq!(cleaner().clean(raw), "Prices rose from $5 quickly to $10.");
    }

    #[test]
    fn idempotent_on_own_output() {
        let raw = r##"<p>The equation <math><annotation encoding="application/x-tex">E=mc^2 &amp;&amp; x &lt; y</annotation></math> was cited<sup class="reference"><a href="#c">&#91;3&#93;</a></sup> as <code>fact</code> &amp;mdash; costing $5 <b>per</b> $10.</p>"##;
        let once = cleaner().clean(raw);
        let twice = cleaner().clean(&once);
        assert_eq!(once, twice);
    }
}
