use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use super::{JudgmentCache, Passage};
use crate::model::truncate_chars;
use crate::oracle::Oracle;

pub const DEFAULT_CHAR_LIMIT: usize = 4000;
pub const MAX_SCORE: u8 = 10;

static SCORE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)score:\s*\**\s*(-?\d{1,9})\s*(?:/\s*10)?").ok());
static JUSTIFICATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)justification:\s*\**\s*(.*)").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceJudgment {
    pub score: u8,
    pub justification: String,
    pub relevant: bool,
}

impl RelevanceJudgment {
    fn unscored(justification: &str) -> Self {
        Self {
            score: 0,
            justification: justification.to_string(),
            relevant: false,
        }
    }
}

/// Scores passages 0-10 against a subtopic. Every outcome is cached, including
/// parse failures and oracle silence, so a (document, subtopic) pair is judged once.
#[derive(Debug, Clone)]
pub struct RelevanceJudge {
    cache: Arc<JudgmentCache<RelevanceJudgment>>,
    char_limit: usize,
}

impl RelevanceJudge {
    pub fn new(cache: Arc<JudgmentCache<RelevanceJudgment>>) -> Self {
        Self {
            cache,
            char_limit: DEFAULT_CHAR_LIMIT,
        }
    }

    pub fn with_char_limit(mut self, char_limit: usize) -> Self {
        self.char_limit = char_limit;
        self
    }

    pub fn cache(&self) -> &Arc<JudgmentCache<RelevanceJudgment>> {
        &self.cache
    }

    pub async fn evaluate(
        &self,
        oracle: &impl Oracle,
        passage: &Passage<'_>,
        score_threshold: u8,
    ) -> RelevanceJudgment {
        let key = passage.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            debug!(paper_id = %passage.document_id, subtopic = %passage.subtopic, "relevance cache hit");
            return cached;
        }

        let prompt = relevance_prompt(passage, &truncate_chars(passage.text, self.char_limit));
        let judgment = match oracle.complete(&prompt).await {
            Some(response) => parse_judgment(&response, score_threshold),
            None => {
                warn!(paper_id = %passage.document_id, "no oracle response for relevance");
                RelevanceJudgment::unscored("no response")
            }
        };
        debug!(
            paper_id = %passage.document_id,
            subtopic = %passage.subtopic,
            source = passage.source.as_str(),
            score = judgment.score,
            relevant = judgment.relevant,
            "relevance judged"
        );
        self.cache.insert_first(key, judgment)
    }
}

fn relevance_prompt(passage: &Passage<'_>, text: &str) -> String {
    let label = passage.source.label();
    let subtopic = passage.subtopic;
    format!(
        "You are evaluating the relevance of a research paper's {label} to a specific subtopic.\n\n\
         Overall User Query: \"{query}\"\n\
         Current Section in Outline: \"{section}\"\n\
         Specific Subtopic Being Researched: \"{subtopic}\"\n\n\
         Assess how directly relevant the following text is to the subtopic '{subtopic}'. \
         Ignore information relevant only to the broader query but not this subtopic.\n\n\
         Text ({label}):\n---\n{text}\n---\n\n\
         Give a relevance score from 0 (not relevant) to 10 (highly relevant) for '{subtopic}' \
         and justify it briefly.\n\n\
         Output format must be exactly:\n\
         Score: [number]/10. Justification: [brief justification]",
        query = passage.query,
        section = passage.section,
    )
}

/// Parse "Score: N/10. Justification: ..." leniently.
pub fn parse_judgment(response: &str, score_threshold: u8) -> RelevanceJudgment {
    let Some(raw) = SCORE
        .as_ref()
        .and_then(|re| re.captures(response))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
    else {
        warn!(response = %truncate_chars(response, 200), "could not parse relevance score");
        return RelevanceJudgment::unscored("parsing failed");
    };
    let score = raw.clamp(0, i64::from(MAX_SCORE)) as u8;

    let justification = JUSTIFICATION
        .as_ref()
        .and_then(|re| re.captures(response))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|j| !j.is_empty())
        .unwrap_or_else(|| "no justification provided".to_string());

    RelevanceJudgment {
        score,
        justification,
        relevant: score >= score_threshold,
    }
}
