use futures::StreamExt;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use motd_common::wiki::WikiClient;

use crate::clean::TextCleaner;
use crate::extract::{ListExtractor, SectionWalker};
use crate::ident::record_id;
use crate::model::Misconception;

/// One source document: page title plus the category label stamped on
/// its records.
#[derive(Debug, Clone, Copy)]
pub struct SourcePage {
    pub title: &'static str,
    pub category: &'static str,
}

/// The themed misconception lists scanned by an extraction run, in
/// merge priority order: on id collisions across documents the later
/// entry wins.
pub const DEFAULT_SOURCES: &[SourcePage] = &[
    SourcePage {
        title: "List of common misconceptions about arts and culture",
        category: "Arts and culture",
    },
    SourcePage {
        title: "List of common misconceptions about history",
        category: "History",
    },
    SourcePage {
        title: "List of common misconceptions about religion",
        category: "Religion",
    },
    SourcePage {
        title: "List of common misconceptions about science, technology, and mathematics",
        category: "Science, technology, and mathematics",
    },
];

const FETCH_CONCURRENCY: usize = 4;

/// Upper bound on the record text carried into an image prompt.
const PROMPT_PREFIX_CHARS: usize = 500;

/// Extracts records from one document's rendered body markup.
pub fn extract_document(
    body: &str,
    category: &str,
    source_url: &str,
    cleaner: &TextCleaner,
    walker: &SectionWalker,
    lists: &ListExtractor,
) -> Vec<Misconception> {
    let mut records = Vec::new();
    for region in walker.walk(body, cleaner) {
        let section = if region.section.is_empty() {
            category.to_string()
        } else {
            region.section.clone()
        };
        for text in lists.extract_items(region.body, cleaner) {
            let id = record_id(&text);
            records.push(Misconception {
                id,
                text,
                section: section.clone(),
                subsection: region.subsection.clone(),
                category: category.to_string(),
                source: source_url.to_string(),
            });
        }
    }
    records
}

/// Fetches every source with bounded concurrency and extracts records
/// in source-list order. A document that fails to fetch is logged and
/// skipped; the run continues with the rest.
pub async fn run_extraction(client: &WikiClient, sources: &[SourcePage]) -> Vec<Misconception> {
    let cleaner = TextCleaner::new();
    let walker = SectionWalker::new();
    let lists = ListExtractor::new();

    let fetched: Vec<_> = futures::stream::iter(sources.iter().copied())
        .map(|source| async move {
            match client.fetch_page(source.title).await {
                Ok(page) => {
                    debug!(
                        title = source.title,
                        sections = page.sections.len(),
                        "fetched source"
                    );
                    Some((source, page))
                }
                Err(e) => {
                    warn!(title = source.title, error = %e, "failed to fetch source, skipping");
                    None
                }
            }
        })
        .buffered(FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut records = Vec::new();
    for (source, page) in fetched.into_iter().flatten() {
        let url = client.page_url(&page.title);
        let extracted = extract_document(&page.text, source.category, &url, &cleaner, &walker, &lists);
        info!(
            title = %page.title,
            records = extracted.len(),
            "extracted source"
        );
        records.extend(extracted);
    }
    records
}

/// Folds fresh records over the previous collection, deduplicating by
/// id. Existing ids keep their position and take the latest record;
/// new ids append in input order.
pub fn merge_records(
    previous: Vec<Misconception>,
    fresh: Vec<Misconception>,
) -> Vec<Misconception> {
    let mut pool: IndexMap<String, Misconception> = IndexMap::new();
    for record in previous.into_iter().chain(fresh) {
        if let Some(existing) = pool.get(&record.id) {
            if existing.text != record.text {
                warn!(
                    id = %record.id,
                    kept = %excerpt(&record.text),
                    replaced = %excerpt(&existing.text),
                    "identifier collision, keeping latest text"
                );
            }
        }
        pool.insert(record.id.clone(), record);
    }
    pool.into_values().collect()
}

/// Prompt payload for a record's illustration. The record text is
/// truncated to a bounded prefix.
pub fn image_prompt(text: &str) -> String {
    let body: String = text.chars().take(PROMPT_PREFIX_CHARS).collect();
    format!(
        "A whimsical detailed illustration of the scene described by this common \
         misconception, drawn as though it were literally true: {body}"
    )
}

fn excerpt(text: &str) -> String {
    text.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MisconceptionSet;

    const PAGE: &str = r##"<div class="mw-parser-output">
<p>Intro prose.</p>
<ul><li>An unsectioned misconception kept from the preamble area.</li></ul>
<h2 id="Biology">Biology</h2>
<ul><li>Bats are <i>not</i> blind and most species can see quite well.</li></ul>
<h3 id="Mammals">Mammals</h3>
<ul><li>Goldfish memories last months rather than seconds.</li></ul>
<h2 id="References">References</h2>
<ul><li>A reference entry that is definitely long enough to keep.</li></ul>
</div>"##;

    fn rec(id: &str, text: &str) -> Misconception {
        Misconception {
            id: id.to_string(),
            text: text.to_string(),
            section: "Biology".to_string(),
            subsection: None,
            category: "Science".to_string(),
            source: "https://example.org/page".to_string(),
        }
    }

    #[test]
    fn extracts_records_with_heading_paths() {
        let cleaner = TextCleaner::new();
        let walker = SectionWalker::new();
        let lists = ListExtractor::new();
        let records = extract_document(
            PAGE,
            "Science",
            "https://example.org/page",
            &cleaner,
            &walker,
            &lists,
        );

        assert_eq!(records.len(), 3);

        // Preamble records take the category as their section.
        assert_eq!(records[0].section, "Science");
        assert_eq!(records[0].subsection, None);

        assert_eq!(records[1].section, "Biology");
        assert_eq!(
            records[1].text,
            "Bats are not blind and most species can see quite well."
        );

        assert_eq!(records[2].section, "Biology");
        assert_eq!(records[2].subsection.as_deref(), Some("Mammals"));

        for record in &records {
            assert_eq!(record.category, "Science");
            assert_eq!(record.source, "https://example.org/page");
            assert_eq!(record.id, record_id(&record.text));
        }
    }

    #[test]
    fn merge_replaces_same_id_keeping_position() {
        let previous = vec![rec("a-1", "old text of the first entry"), rec("b-2", "second entry")];
        let fresh = vec![rec("a-1", "new text of the first entry")];
        let merged = merge_records(previous, fresh);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "a-1");
        assert_eq!(merged[0].text, "new text of the first entry");
        assert_eq!(merged[1].id, "b-2");
    }

    #[test]
    fn merge_appends_new_records_after_existing() {
        let previous = vec![rec("a-1", "kept first"), rec("b-2", "kept second")];
        let fresh = vec![rec("c-3", "appended third")];
        let merged = merge_records(previous, fresh);
        let ids: Vec<_> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a-1", "b-2", "c-3"]);
    }

    #[test]
    fn duplicate_ids_in_one_run_collapse_to_the_latest() {
        let fresh = vec![
            rec("a-1", "first version of this text"),
            rec("c-3", "an unrelated entry"),
            rec("a-1", "second version of this text"),
        ];
        let merged = merge_records(Vec::new(), fresh);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "a-1");
        assert_eq!(merged[0].text, "second version of this text");

        let set = MisconceptionSet::new(merged);
        assert_eq!(set.total_count, set.len());
        let mut ids: Vec<_> = set.misconceptions.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), set.len());
    }

    #[test]
    fn prompt_is_bounded() {
        let long = "x".repeat(2_000);
        let prompt = image_prompt(&long);
        assert!(prompt.chars().count() < 700);
        assert_eq!(prompt.matches('x').count(), PROMPT_PREFIX_CHARS);
    }
}
