use std::time::Duration;

/// Limits and thresholds for researching one subtopic.
///
/// There is deliberately no `Default`: every value comes from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchBudgets {
    /// Most documents evaluated per subtopic per run.
    pub max_evaluations: usize,
    /// Confirmed-relevant documents after which the fallback tier stops early.
    pub relevant_target: usize,
    /// Local hits at or above this count make the fallback unnecessary.
    pub local_min_documents: usize,
    /// Local confirmed-relevant count at or above this makes the fallback unnecessary.
    pub local_min_relevant: usize,
    /// Records requested from each provider per fallback keyword.
    pub api_fetch_size: usize,
    /// Score at which a document counts as confirmed-relevant.
    pub relevance_threshold: u8,
    /// Score at which the judge calls a passage relevant.
    pub score_threshold: u8,
    pub local_search_limit: usize,
    pub local_keyword_count: usize,
    pub fallback_keyword_count: usize,
    pub full_text: bool,
    /// Pause after each evaluated document.
    pub pause: Duration,
}

impl ResearchBudgets {
    pub fn budget_exhausted(&self, evaluated: usize) -> bool {
        evaluated >= self.max_evaluations
    }

    pub fn target_met(&self, relevant: usize) -> bool {
        relevant >= self.relevant_target
    }

    /// The API tier runs only when the local tier was thin on both counts
    /// and neither the budget nor the target stops it.
    pub fn should_fallback(&self, local_found: usize, relevant: usize, evaluated: usize) -> bool {
        local_found < self.local_min_documents
            && relevant < self.local_min_relevant
            && !self.budget_exhausted(evaluated)
            && !self.target_met(relevant)
    }
}

#[cfg(test)]
pub(crate) fn test_budgets() -> ResearchBudgets {
    ResearchBudgets {
        max_evaluations: 40,
        relevant_target: 10,
        local_min_documents: 10,
        local_min_relevant: 3,
        api_fetch_size: 20,
        relevance_threshold: 5,
        score_threshold: 6,
        local_search_limit: 50,
        local_keyword_count: 5,
        fallback_keyword_count: 3,
        full_text: true,
        pause: Duration::ZERO,
    }
}
