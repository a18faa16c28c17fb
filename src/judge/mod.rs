//! Oracle-backed relevance scoring and finding extraction, memoized per
//! (document, subtopic).

pub mod cache;
pub mod findings;
pub mod relevance;

pub use cache::{CacheKey, JudgmentCache};
pub use findings::FindingExtractor;
pub use relevance::{RelevanceJudge, RelevanceJudgment};

use crate::model::TextSource;

/// Text handed to the oracle, with the context it is judged against.
#[derive(Debug, Clone, Copy)]
pub struct Passage<'a> {
    pub document_id: &'a str,
    pub text: &'a str,
    pub source: TextSource,
    pub subtopic: &'a str,
    pub section: &'a str,
    pub query: &'a str,
}

impl Passage<'_> {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.document_id, self.subtopic)
    }
}
