use std::sync::Arc;

use tracing::{debug, warn};

use super::{JudgmentCache, Passage};
use crate::model::truncate_chars;
use crate::oracle::Oracle;

pub const DEFAULT_CHAR_LIMIT: usize = 6000;

/// Answers that mean "nothing found", compared after dropping punctuation and case.
const NO_FINDING_PHRASES: &[&str] = &[
    "none",
    "no findings",
    "no findings found",
    "no specific findings found",
    "no relevant findings",
];

/// Pulls subtopic-specific findings out of a passage.
///
/// `None` results are cached too; a cached `None` is final for that key.
#[derive(Debug, Clone)]
pub struct FindingExtractor {
    cache: Arc<JudgmentCache<Option<String>>>,
    char_limit: usize,
}

impl FindingExtractor {
    pub fn new(cache: Arc<JudgmentCache<Option<String>>>) -> Self {
        Self {
            cache,
            char_limit: DEFAULT_CHAR_LIMIT,
        }
    }

    pub fn with_char_limit(mut self, char_limit: usize) -> Self {
        self.char_limit = char_limit;
        self
    }

    pub fn cache(&self) -> &Arc<JudgmentCache<Option<String>>> {
        &self.cache
    }

    pub async fn extract(&self, oracle: &impl Oracle, passage: &Passage<'_>) -> Option<String> {
        let key = passage.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            debug!(paper_id = %passage.document_id, subtopic = %passage.subtopic, "finding cache hit");
            return cached;
        }

        let prompt = finding_prompt(passage, &truncate_chars(passage.text, self.char_limit));
        let finding = match oracle.complete(&prompt).await {
            Some(response) => interpret(&response),
            None => {
                warn!(paper_id = %passage.document_id, "no oracle response for finding extraction");
                None
            }
        };
        debug!(
            paper_id = %passage.document_id,
            subtopic = %passage.subtopic,
            found = finding.is_some(),
            "finding extraction"
        );
        self.cache.insert_first(key, finding)
    }
}

fn finding_prompt(passage: &Passage<'_>, text: &str) -> String {
    let label = passage.source.label();
    let subtopic = passage.subtopic;
    format!(
        "Analyze the following {label} from a research paper (Paper ID: {id}).\n\
         The overall research focuses on: \"{query}\"\n\
         This analysis is for the section '{section}' and specifically the subtopic: '{subtopic}'.\n\n\
         Extract the key sentences or short paragraphs (max 2-3 sentences) that state concrete \
         findings, evidence, data, methods or conclusions directly relevant to '{subtopic}'. \
         Avoid generic statements.\n\n\
         Text ({label}):\n---\n{text}\n---\n\n\
         If there are relevant findings, list them concisely, using bullet points for several.\n\
         If there are no findings directly about '{subtopic}', output the single word: None\n\n\
         Extracted Findings for '{subtopic}':",
        id = passage.document_id,
        query = passage.query,
        section = passage.section,
    )
}

/// Trimmed finding text, or `None` for blank or "no findings" answers.
fn interpret(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if trimmed.is_empty() || is_no_finding(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

fn is_no_finding(text: &str) -> bool {
    let normalized: String = text
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .to_lowercase();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    NO_FINDING_PHRASES.contains(&normalized.as_str())
}
