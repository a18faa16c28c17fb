use tracing::{info, warn};

use super::SubtopicResearcher;
use crate::fetch::FullTextSource;
use crate::model::MergedDocuments;
use crate::oracle::{Oracle, generate_keywords};
use crate::providers::LiteratureSearch;

impl<O, A, B, F> SubtopicResearcher<O, A, B, F>
where
    O: Oracle,
    A: LiteratureSearch,
    B: LiteratureSearch,
    F: FullTextSource,
{
    /// Seed the local corpus for `query` from both providers.
    ///
    /// Returns the number of new documents stored; existing ids are left untouched.
    pub async fn ingest(
        &self,
        query: &str,
        keyword_count: usize,
        per_keyword_target: usize,
        plan_id: Option<i64>,
    ) -> usize {
        let mut keywords = generate_keywords(&self.oracle, query, keyword_count).await;
        if keywords.is_empty() {
            keywords.push(query.to_string());
        }
        info!(%query, ?keywords, "ingesting");

        let mut merged = MergedDocuments::new();
        for keyword in &keywords {
            for harvest in self.harvest(keyword, per_keyword_target).await {
                merged.extend(harvest.records);
            }
        }

        let stored = self.persist_documents(merged.iter(), plan_id);
        info!(%query, found = merged.len(), stored, "ingest done");
        stored
    }

    /// One indexing cycle over the `limit` most recent distinct plan queries.
    pub async fn ingest_recent(
        &self,
        limit: usize,
        keyword_count: usize,
        per_keyword_target: usize,
    ) -> usize {
        let queries = match self.db().recent_queries(limit) {
            Ok(queries) => queries,
            Err(e) => {
                warn!(error = %e, "could not read recent queries");
                return 0;
            }
        };
        if queries.is_empty() {
            info!("no stored plans to ingest for");
            return 0;
        }

        let mut stored = 0;
        for query in &queries {
            stored += self.ingest(query, keyword_count, per_keyword_target, None).await;
        }
        info!(queries = queries.len(), stored, "indexing cycle done");
        stored
    }
}
