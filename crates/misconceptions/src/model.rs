use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extracted misconception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Misconception {
    /// Content-derived identifier, stable across runs for unchanged
    /// text. Also names the record's generated image file.
    pub id: String,
    /// Cleaned prose. May contain `$...$` formula spans.
    pub text: String,
    /// Nearest top-level heading, or the source category when the
    /// record sat before the first heading.
    pub section: String,
    /// Nearest second-level heading, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,
    /// Category label of the source document.
    pub category: String,
    /// Canonical URL of the source document.
    pub source: String,
}

/// The persisted collection artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisconceptionSet {
    pub generated_at: DateTime<Utc>,
    /// Always equals `misconceptions.len()`.
    pub total_count: usize,
    pub misconceptions: Vec<Misconception>,
}

impl MisconceptionSet {
    /// Wraps records with a fresh generation timestamp and count.
    pub fn new(misconceptions: Vec<Misconception>) -> Self {
        Self {
            generated_at: Utc::now(),
            total_count: misconceptions.len(),
            misconceptions,
        }
    }

    pub fn len(&self) -> usize {
        self.misconceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.misconceptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> Misconception {
        Misconception {
            id: id.to_string(),
            text: "The Earth is not a perfect sphere.".to_string(),
            section: "Astronomy".to_string(),
            subsection: None,
            category: "Science".to_string(),
            source: "https://en.wikipedia.org/wiki/Example".to_string(),
        }
    }

    #[test]
    fn artifact_field_names_are_camel_case() {
        let set = MisconceptionSet::new(vec![record("a-1")]);
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.get("generatedAt").is_some());
        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["misconceptions"][0]["id"], "a-1");
        // An absent subsection is omitted entirely.
        assert!(json["misconceptions"][0].get("subsection").is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let mut entry = record("b-2");
        entry.subsection = Some("Orbits".to_string());
        let set = MisconceptionSet::new(vec![entry.clone()]);
        let json = serde_json::to_string(&set).unwrap();
        let back: MisconceptionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_count, 1);
        assert_eq!(back.misconceptions[0], entry);
        assert_eq!(back.misconceptions[0].subsection.as_deref(), Some("Orbits"));
    }

    #[test]
    fn count_tracks_records() {
        let set = MisconceptionSet::new(vec![record("a-1"), record("b-2")]);
        assert_eq!(set.total_count, set.len());
        assert!(!set.is_empty());
        assert!(MisconceptionSet::new(Vec::new()).is_empty());
    }
}
