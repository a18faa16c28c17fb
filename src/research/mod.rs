//! Per-subtopic research: local corpus first, bibliographic APIs when the local
//! tier comes up thin, every candidate judged and mined for findings within a
//! fixed evaluation budget.

pub mod ingest;
pub mod policy;
pub mod state;

use std::sync::Arc;

use tracing::{debug, info, warn};

pub use policy::ResearchBudgets;
pub use state::{ResearchRun, SubtopicEvaluationState};

use crate::fetch::FullTextSource;
use crate::index::CorpusIndex;
use crate::judge::{FindingExtractor, JudgmentCache, Passage, RelevanceJudge, RelevanceJudgment};
use crate::model::{DocumentRecord, FindingRecord, MergedDocuments, TextSource, context_snippet};
use crate::oracle::{Oracle, generate_keywords, terms_with_subtopic};
use crate::providers::{Harvest, HarvestStatus, LiteratureSearch};
use crate::storage::Database;

const UNKNOWN_SECTION: &str = "Unknown Section";

/// Where a subtopic sits in the overall research plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    pub subtopic: String,
    pub section: String,
    pub query: String,
    pub plan_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSection {
    pub name: String,
    pub subtopics: Vec<String>,
}

/// The outline produced upstream: sections, each listing its subtopics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchPlan {
    pub plan_id: Option<i64>,
    pub query: String,
    pub sections: Vec<PlanSection>,
}

impl ResearchPlan {
    /// Name of the first section listing `subtopic`, else "Unknown Section".
    pub fn section_for(&self, subtopic: &str) -> &str {
        self.sections
            .iter()
            .find(|s| s.subtopics.iter().any(|t| t == subtopic))
            .map_or(UNKNOWN_SECTION, |s| s.name.as_str())
    }

    pub fn context_for(&self, subtopic: &str) -> PlanContext {
        PlanContext {
            subtopic: subtopic.to_string(),
            section: self.section_for(subtopic).to_string(),
            query: self.query.clone(),
            plan_id: self.plan_id,
        }
    }
}

/// Counts from one `research_subtopic` call. Observational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtopicOutcome {
    pub local_candidates: usize,
    pub api_candidates: usize,
    pub fallback_ran: bool,
    /// Documents evaluated during this call.
    pub evaluated: usize,
    /// Documents for the subtopic meeting the relevance threshold so far in the run.
    pub relevant: usize,
    pub findings_saved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Local,
    Api,
}

impl Tier {
    fn as_str(self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Api => "api",
        }
    }
}

pub struct SubtopicResearcher<O, A, B, F> {
    oracle: O,
    index: Arc<CorpusIndex>,
    semantic_scholar: A,
    openalex: B,
    full_text: F,
    judge: RelevanceJudge,
    extractor: FindingExtractor,
}

impl<O, A, B, F> SubtopicResearcher<O, A, B, F>
where
    O: Oracle,
    A: LiteratureSearch,
    B: LiteratureSearch,
    F: FullTextSource,
{
    /// Researcher with its own fresh judgment caches.
    pub fn new(oracle: O, index: Arc<CorpusIndex>, semantic_scholar: A, openalex: B, full_text: F) -> Self {
        Self {
            oracle,
            index,
            semantic_scholar,
            openalex,
            full_text,
            judge: RelevanceJudge::new(Arc::new(JudgmentCache::new())),
            extractor: FindingExtractor::new(Arc::new(JudgmentCache::new())),
        }
    }

    /// Share judge and extractor (and so their caches) with other researchers.
    pub fn with_judges(mut self, judge: RelevanceJudge, extractor: FindingExtractor) -> Self {
        self.judge = judge;
        self.extractor = extractor;
        self
    }

    pub fn judge(&self) -> &RelevanceJudge {
        &self.judge
    }

    pub fn extractor(&self) -> &FindingExtractor {
        &self.extractor
    }

    pub fn index(&self) -> &Arc<CorpusIndex> {
        &self.index
    }

    fn db(&self) -> &Database {
        self.index.database()
    }

    /// Gather, judge, and persist evidence for one subtopic.
    ///
    /// Never fails: degraded providers, oracle silence and storage errors all
    /// end up as fewer findings.
    pub async fn research_subtopic(
        &self,
        ctx: &PlanContext,
        budgets: &ResearchBudgets,
        run: &mut ResearchRun,
    ) -> SubtopicOutcome {
        let state = run.state_mut(&ctx.subtopic);
        let mut outcome = SubtopicOutcome::default();
        info!(subtopic = %ctx.subtopic, section = %ctx.section, "researching subtopic");

        let keywords =
            generate_keywords(&self.oracle, &ctx.subtopic, budgets.local_keyword_count).await;
        let terms = terms_with_subtopic(&ctx.subtopic, keywords);
        let local = MergedDocuments::from_records(self.index.search(&terms, budgets.local_search_limit));
        outcome.local_candidates = local.len();
        debug!(subtopic = %ctx.subtopic, ?terms, found = local.len(), "local candidates");

        self.evaluate_tier(Tier::Local, local.iter(), ctx, budgets, state, &mut outcome)
            .await;

        let relevant = state.relevant_count(budgets.relevance_threshold);
        info!(
            subtopic = %ctx.subtopic,
            relevant,
            evaluated = state.evaluated_count(),
            budget = budgets.max_evaluations,
            "local tier done"
        );

        if budgets.should_fallback(local.len(), relevant, state.evaluated_count()) {
            outcome.fallback_ran = true;
            let found = self.search_fallback(ctx, budgets, &local, state).await;
            outcome.api_candidates = found.len();
            self.persist_documents(found.iter(), ctx.plan_id);
            self.evaluate_tier(Tier::Api, found.iter(), ctx, budgets, state, &mut outcome)
                .await;
        }

        outcome.relevant = state.relevant_count(budgets.relevance_threshold);
        info!(
            subtopic = %ctx.subtopic,
            evaluated = outcome.evaluated,
            relevant = outcome.relevant,
            target = budgets.relevant_target,
            threshold = budgets.relevance_threshold,
            fallback = outcome.fallback_ran,
            "finished subtopic"
        );
        outcome
    }

    async fn evaluate_tier<'d>(
        &self,
        tier: Tier,
        documents: impl Iterator<Item = &'d DocumentRecord>,
        ctx: &PlanContext,
        budgets: &ResearchBudgets,
        state: &mut SubtopicEvaluationState,
        outcome: &mut SubtopicOutcome,
    ) {
        for doc in documents {
            if state.is_evaluated(&doc.id) {
                continue;
            }
            if budgets.budget_exhausted(state.evaluated_count()) {
                debug!(tier = tier.as_str(), limit = budgets.max_evaluations, "evaluation budget spent");
                break;
            }
            if tier == Tier::Api && budgets.target_met(state.relevant_count(budgets.relevance_threshold)) {
                debug!(target = budgets.relevant_target, "relevant target reached");
                break;
            }

            debug!(
                tier = tier.as_str(),
                paper_id = %doc.id,
                origin = %doc.origin(),
                n = state.evaluated_count() + 1,
                "evaluating"
            );
            let (score, saved) = self.evaluate_document(doc, ctx, budgets).await;
            state.record_score(&doc.id, score);
            state.mark_evaluated(&doc.id);
            outcome.evaluated += 1;
            outcome.findings_saved += saved;

            if !budgets.pause.is_zero() {
                tokio::time::sleep(budgets.pause).await;
            }
        }
    }

    /// Judge the abstract, escalate to full text when it helps, and persist findings.
    /// Returns the recorded score and the number of findings saved.
    async fn evaluate_document(
        &self,
        doc: &DocumentRecord,
        ctx: &PlanContext,
        budgets: &ResearchBudgets,
    ) -> (u8, usize) {
        let mut score = 0;
        let mut abstract_judgment = None;
        let mut has_finding = false;
        let mut saved = 0;

        if let Some(text) = doc.abstract_text() {
            let passage = passage(doc, text, TextSource::Abstract, ctx);
            let judgment = self
                .judge
                .evaluate(&self.oracle, &passage, budgets.score_threshold)
                .await;
            score = judgment.score;
            if judgment.relevant
                && let Some(finding) = self.extractor.extract(&self.oracle, &passage).await
            {
                has_finding = true;
                saved += usize::from(self.persist_finding(ctx, &passage, finding, &judgment));
            }
            abstract_judgment = Some(judgment).filter(|j| j.relevant);
        }

        let escalate = abstract_judgment.is_none() || !has_finding;
        let url = doc.pdf_url().filter(|_| budgets.full_text && escalate);
        let Some(url) = url else {
            return (score, saved);
        };
        let Some(text) = self.full_text.fetch_text(url).await else {
            debug!(paper_id = %doc.id, "full text unavailable, skipping escalation");
            return (score, saved);
        };

        let passage = passage(doc, &text, TextSource::FullText, ctx);
        let judgment = match abstract_judgment {
            Some(judgment) => judgment,
            None => {
                let judgment = self
                    .judge
                    .evaluate(&self.oracle, &passage, budgets.score_threshold)
                    .await;
                score = judgment.score;
                judgment
            }
        };
        if judgment.relevant
            && !has_finding
            && let Some(finding) = self.extractor.extract(&self.oracle, &passage).await
        {
            saved += usize::from(self.persist_finding(ctx, &passage, finding, &judgment));
        }
        (score, saved)
    }

    fn persist_finding(
        &self,
        ctx: &PlanContext,
        passage: &Passage<'_>,
        finding: String,
        judgment: &RelevanceJudgment,
    ) -> bool {
        let record = FindingRecord {
            plan_id: ctx.plan_id,
            subtopic: ctx.subtopic.clone(),
            document_id: passage.document_id.to_string(),
            finding,
            source: passage.source,
            relevance_score: judgment.score,
            justification: judgment.justification.clone(),
            context_snippet: context_snippet(passage.text),
        };
        match self.db().save_finding(&record) {
            Ok(id) => {
                debug!(finding_id = id, paper_id = %record.document_id, source = record.source.as_str(), "finding saved");
                true
            }
            Err(e) => {
                warn!(paper_id = %record.document_id, error = %e, "failed to save finding");
                false
            }
        }
    }

    /// Insert documents not yet stored. Returns how many rows were written.
    fn persist_documents<'d>(
        &self,
        documents: impl Iterator<Item = &'d DocumentRecord>,
        plan_id: Option<i64>,
    ) -> usize {
        let mut written = 0;
        for doc in documents {
            match self.db().save_document(doc, plan_id) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => warn!(paper_id = %doc.id, error = %e, "failed to save document"),
            }
        }
        written
    }

    async fn search_fallback(
        &self,
        ctx: &PlanContext,
        budgets: &ResearchBudgets,
        local: &MergedDocuments,
        state: &SubtopicEvaluationState,
    ) -> MergedDocuments {
        let topic = format!("academic papers about {}", ctx.subtopic);
        let mut keywords =
            generate_keywords(&self.oracle, &topic, budgets.fallback_keyword_count).await;
        if keywords.is_empty() {
            keywords.push(ctx.subtopic.clone());
        }
        info!(subtopic = %ctx.subtopic, ?keywords, "falling back to bibliographic APIs");

        let mut found = MergedDocuments::new();
        for keyword in &keywords {
            for harvest in self.harvest(keyword, budgets.api_fetch_size).await {
                found.extend(
                    harvest
                        .records
                        .into_iter()
                        .filter(|r| !local.contains(&r.id) && !state.is_evaluated(&r.id)),
                );
            }
        }
        info!(subtopic = %ctx.subtopic, new = found.len(), "fallback candidates");
        found
    }

    /// Query both providers for `term` side by side.
    async fn harvest(&self, term: &str, target_total: usize) -> [Harvest; 2] {
        let (a, b) = futures::join!(
            self.semantic_scholar.search(term, target_total),
            self.openalex.search(term, target_total),
        );
        for (provider, harvest) in [
            (self.semantic_scholar.provider(), &a),
            (self.openalex.provider(), &b),
        ] {
            match &harvest.status {
                HarvestStatus::Complete => {
                    debug!(%provider, %term, records = harvest.records.len(), "provider search")
                }
                HarvestStatus::Partial { reason } => warn!(
                    %provider,
                    %term,
                    records = harvest.records.len(),
                    %reason,
                    "provider search incomplete"
                ),
            }
        }
        [a, b]
    }
}

fn passage<'a>(
    doc: &'a DocumentRecord,
    text: &'a str,
    source: TextSource,
    ctx: &'a PlanContext,
) -> Passage<'a> {
    Passage {
        document_id: &doc.id,
        text,
        source,
        subtopic: &ctx.subtopic,
        section: &ctx.section,
        query: &ctx.query,
    }
}
