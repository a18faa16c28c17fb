//! Document records shared by every tier, plus the decoding and merge rules applied to them.

pub(crate) mod decode;
pub mod merge;

use std::fmt;

pub use merge::{MergedDocuments, is_more_complete};

/// Where a record was first sighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    LocalCorpus,
    SemanticScholar,
    OpenAlex,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::LocalCorpus => "local_db",
            Provider::SemanticScholar => "semantic_scholar",
            Provider::OpenAlex => "openalex",
        }
    }

    /// Unknown or missing labels are treated as local corpus rows.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("semantic_scholar") | Some("semantic_scholar_fallback") => {
                Provider::SemanticScholar
            }
            Some("openalex") => Provider::OpenAlex,
            _ => Provider::LocalCorpus,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bibliographic record. `id` never changes once created.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub abstract_text: Option<String>,
    pub venue: Option<String>,
    pub journal: Option<String>,
    pub citation_count: Option<u32>,
    pub pdf_url: Option<String>,
    pub publication_types: Vec<String>,
    pub origin: Option<Provider>,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Abstract text, ignoring blank strings.
    pub fn abstract_text(&self) -> Option<&str> {
        self.abstract_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn pdf_url(&self) -> Option<&str> {
        self.pdf_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    pub fn origin(&self) -> Provider {
        self.origin.unwrap_or(Provider::LocalCorpus)
    }
}

/// Which part of a document a judgment or finding was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Abstract,
    FullText,
}

impl TextSource {
    /// Value stored in the `source_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            TextSource::Abstract => "abstract",
            TextSource::FullText => "full_text",
        }
    }

    /// Wording used when describing the text to the oracle.
    pub fn label(self) -> &'static str {
        match self {
            TextSource::Abstract => "abstract",
            TextSource::FullText => "full paper text",
        }
    }
}

/// A finding ready to be written to the `findings` table.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingRecord {
    pub plan_id: Option<i64>,
    pub subtopic: String,
    pub document_id: String,
    pub finding: String,
    pub source: TextSource,
    pub relevance_score: u8,
    pub justification: String,
    pub context_snippet: String,
}

const SNIPPET_CHARS: usize = 1000;

/// First 1000 characters of `text`, with `...` appended when cut.
pub fn context_snippet(text: &str) -> String {
    truncate_chars(text, SNIPPET_CHARS)
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
