use std::collections::{HashMap, HashSet};

/// Which documents a subtopic has seen in this run, and the score each received.
#[derive(Debug, Default, Clone)]
pub struct SubtopicEvaluationState {
    evaluated: HashSet<String>,
    scores: HashMap<String, u8>,
}

impl SubtopicEvaluationState {
    pub fn is_evaluated(&self, document_id: &str) -> bool {
        self.evaluated.contains(document_id)
    }

    /// Returns false if the document was already marked.
    pub fn mark_evaluated(&mut self, document_id: &str) -> bool {
        self.evaluated.insert(document_id.to_string())
    }

    pub fn record_score(&mut self, document_id: &str, score: u8) {
        self.scores.insert(document_id.to_string(), score);
    }

    pub fn score(&self, document_id: &str) -> Option<u8> {
        self.scores.get(document_id).copied()
    }

    pub fn evaluated_count(&self) -> usize {
        self.evaluated.len()
    }

    pub fn relevant_count(&self, threshold: u8) -> usize {
        self.scores.values().filter(|&&s| s >= threshold).count()
    }
}

/// Evaluation state for one orchestration run, one entry per subtopic.
#[derive(Debug, Default)]
pub struct ResearchRun {
    subtopics: HashMap<String, SubtopicEvaluationState>,
}

impl ResearchRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_mut(&mut self, subtopic: &str) -> &mut SubtopicEvaluationState {
        self.subtopics.entry(subtopic.to_string()).or_default()
    }

    pub fn state(&self, subtopic: &str) -> Option<&SubtopicEvaluationState> {
        self.subtopics.get(subtopic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_is_idempotent() {
        let mut state = SubtopicEvaluationState::default();
        assert!(state.mark_evaluated("p1"));
        assert!(!state.mark_evaluated("p1"));
        assert_eq!(state.evaluated_count(), 1);
        assert!(state.is_evaluated("p1"));
    }

    #[test]
    fn relevant_count_uses_threshold() {
        let mut state = SubtopicEvaluationState::default();
        state.record_score("a", 3);
        state.record_score("b", 5);
        state.record_score("c", 9);
        assert_eq!(state.relevant_count(5), 2);
        assert_eq!(state.relevant_count(10), 0);

        state.record_score("a", 7);
        assert_eq!(state.relevant_count(5), 3);
        assert_eq!(state.score("a"), Some(7));
    }

    #[test]
    fn run_keeps_subtopics_apart() {
        let mut run = ResearchRun::new();
        run.state_mut("sleep").mark_evaluated("p1");
        assert!(run.state("sleep").is_some_and(|s| s.is_evaluated("p1")));
        assert!(run.state("diet").is_none());
        assert!(!run.state_mut("diet").is_evaluated("p1"));
    }
}
