use tracing::{debug, warn};

use super::Oracle;

fn keyword_prompt(topic: &str, count: usize) -> String {
    format!(
        "Generate {count} diverse and effective search keywords or short phrases for academic \
         databases related to the topic: '{topic}'.\n\
         Focus on core concepts, synonyms, and related terms.\n\
         Example: [\"keyword one\", \"alternative phrase two\", \"related concept three\"]\n\
         Include the original topic if it seems like a good keyword itself.\n\
         Output ONLY the raw JSON list of strings."
    )
}

/// Ask the oracle for up to `count` search keywords for `topic`.
///
/// Anything other than a JSON list of strings yields an empty list.
pub async fn generate_keywords(oracle: &impl Oracle, topic: &str, count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    let Some(response) = oracle.complete(&keyword_prompt(topic, count)).await else {
        warn!(%topic, "no keyword suggestions from oracle");
        return Vec::new();
    };

    match serde_json::from_str::<Vec<String>>(strip_code_fence(&response)) {
        Ok(mut keywords) => {
            keywords.retain(|k| !k.trim().is_empty());
            keywords.truncate(count);
            debug!(%topic, ?keywords, "keyword suggestions");
            keywords
        }
        Err(e) => {
            warn!(%topic, error = %e, "keyword suggestions were not a JSON list of strings");
            Vec::new()
        }
    }
}

/// Search terms for a subtopic: the subtopic first, then the suggestions.
pub fn terms_with_subtopic(subtopic: &str, keywords: Vec<String>) -> Vec<String> {
    let present = keywords
        .iter()
        .any(|k| k.trim().eq_ignore_ascii_case(subtopic.trim()));
    if present {
        return keywords;
    }
    let mut terms = Vec::with_capacity(keywords.len() + 1);
    terms.push(subtopic.to_string());
    terms.extend(keywords);
    terms
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_code_fence("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fence("```\n[\"a\"]```"), "[\"a\"]");
        assert_eq!(strip_code_fence("```json[\"a\"]```"), "[\"a\"]");
        assert_eq!(strip_code_fence("  [\"a\"] "), "[\"a\"]");
    }

    #[tokio::test]
    async fn fenced_list_is_parsed_and_truncated() {
        let oracle = ScriptedOracle::new([Some("```json\n[\"sleep\", \"memory\", \"rem\", \"naps\"]\n```")]);
        let keywords = generate_keywords(&oracle, "sleep", 3).await;
        assert_eq!(keywords, ["sleep", "memory", "rem"]);
    }

    #[tokio::test]
    async fn non_list_answer_yields_nothing() {
        let oracle = ScriptedOracle::new([Some("{\"keywords\": [\"a\"]}")]);
        assert!(generate_keywords(&oracle, "sleep", 3).await.is_empty());

        let oracle = ScriptedOracle::new([Some("sleep, memory")]);
        assert!(generate_keywords(&oracle, "sleep", 3).await.is_empty());
    }

    #[tokio::test]
    async fn no_response_yields_nothing() {
        let oracle = ScriptedOracle::new([None::<String>]);
        assert!(generate_keywords(&oracle, "sleep", 3).await.is_empty());
    }

    #[test]
    fn subtopic_is_prepended_when_absent() {
        assert_eq!(
            terms_with_subtopic("sleep", vec!["memory".into()]),
            ["sleep", "memory"]
        );
        assert_eq!(
            terms_with_subtopic("Sleep", vec!["memory".into(), "sleep".into()]),
            ["memory", "sleep"]
        );
        assert_eq!(terms_with_subtopic("sleep", Vec::new()), ["sleep"]);
    }
}
