use std::env;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::retry::{Pacer, PageOutcome, RetryPolicy, fetch_with_backoff};
use super::types::{Paper, PaperSearchPage};
use super::{Harvest, LiteratureSearch, ProviderError, check_status};
use crate::model::decode::names_from_value;
use crate::model::{DocumentRecord, Provider};

pub const API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
pub const PAGE_SIZE: usize = 100;
const FIELDS: &str = "paperId,title,authors,year,abstract,venue,citationCount,openAccessPdf,publicationTypes,journal";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Offset-paginated client for the Semantic Scholar Graph API.
#[derive(Debug)]
pub struct SemanticScholarClient {
    http: Client,
    base_url: String,
    api_key: Option<ApiKey>,
    page_size: usize,
    publication_types: Option<String>,
    year: Option<String>,
    policy: RetryPolicy,
    pacer: Pacer,
}

impl SemanticScholarClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: API_BASE.to_string(),
            api_key: None,
            page_size: PAGE_SIZE,
            publication_types: None,
            year: None,
            policy: RetryPolicy::default(),
            pacer: Pacer::new(Duration::from_secs(1)),
        }
    }

    /// Picks up `SEMANTIC_SCHOLAR_API_KEY` when set. The key is optional.
    pub fn from_env(http: Client) -> Self {
        let api_key = env::var("SEMANTIC_SCHOLAR_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!("SEMANTIC_SCHOLAR_API_KEY not set, using shared rate limit");
        }
        Self {
            api_key: api_key.map(ApiKey),
            ..Self::new(http)
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy, min_interval: Duration) -> Self {
        self.policy = policy;
        self.pacer = Pacer::new(min_interval);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self
    }

    /// Server-side filters, passed through verbatim (`JournalArticle,Review`, `-2024`).
    pub fn with_filters(mut self, publication_types: Option<String>, year: Option<String>) -> Self {
        self.publication_types = publication_types.filter(|v| !v.trim().is_empty());
        self.year = year.filter(|v| !v.trim().is_empty());
        self
    }

    async fn fetch_page(
        &self,
        term: &str,
        offset: usize,
        limit: usize,
    ) -> Result<PaperSearchPage, ProviderError> {
        let url = format!("{}/paper/search", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("query", term.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
            ("fields", FIELDS.to_string()),
        ];
        if let Some(types) = &self.publication_types {
            query.push(("publicationTypes", types.clone()));
        }
        if let Some(year) = &self.year {
            query.push(("year", year.clone()));
        }

        let mut request = self
            .http
            .get(&url)
            .query(&query)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", &key.0);
        }

        let response = check_status(request.send().await?)?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl LiteratureSearch for SemanticScholarClient {
    fn provider(&self) -> Provider {
        Provider::SemanticScholar
    }

    async fn search(&self, term: &str, target_total: usize) -> Harvest {
        let mut records = Vec::new();
        let mut offset = 0;

        while records.len() < target_total {
            let limit = self.page_size.min(target_total - records.len());
            let outcome = fetch_with_backoff(&self.policy, &self.pacer, move || {
                self.fetch_page(term, offset, limit)
            })
            .await;

            let page = match outcome {
                PageOutcome::Fetched { page, .. } => page,
                PageOutcome::Exhausted { last_error, .. } => {
                    warn!(%term, offset, error = %last_error, "semantic scholar retries exhausted, keeping partial results");
                    return Harvest::partial(records, format!("retries exhausted: {last_error}"));
                }
                PageOutcome::Failed { error, .. } => {
                    warn!(%term, offset, error = %error, "semantic scholar request failed, keeping partial results");
                    return Harvest::partial(records, error.to_string());
                }
            };

            if page.data.is_empty() {
                debug!(%term, offset, "semantic scholar returned an empty page");
                break;
            }
            offset += page.data.len();
            records.extend(page.data.into_iter().filter_map(paper_to_record));
            debug!(%term, offset, collected = records.len(), total = ?page.total, "semantic scholar page");

            if page.total.is_some_and(|total| offset >= total) {
                break;
            }
        }

        records.truncate(target_total);
        info!(%term, count = records.len(), "semantic scholar search complete");
        Harvest::complete(records)
    }
}

fn paper_to_record(paper: Paper) -> Option<DocumentRecord> {
    let id = paper.paper_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())?;
    Some(DocumentRecord {
        id,
        title: paper.title.unwrap_or_default(),
        authors: names_from_value(paper.authors),
        year: paper.year,
        abstract_text: paper.abstract_text,
        venue: paper.venue.filter(|v| !v.is_empty()),
        journal: paper.journal.and_then(|j| j.name).filter(|n| !n.is_empty()),
        citation_count: paper.citation_count,
        pdf_url: paper.open_access_pdf.and_then(|p| p.url).filter(|u| !u.is_empty()),
        publication_types: names_from_value(paper.publication_types),
        origin: Some(Provider::SemanticScholar),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_maps_nested_fields() {
        let paper: Paper = serde_json::from_value(serde_json::json!({
            "paperId": "abc",
            "title": "Sleep and memory",
            "authors": [{"authorId": "1", "name": "Ada"}, {"authorId": "2", "name": "Grace"}],
            "year": 2021,
            "abstract": "We study sleep.",
            "citationCount": 14,
            "openAccessPdf": {"url": "https://example.org/abc.pdf"},
            "publicationTypes": ["JournalArticle"],
            "journal": {"name": "Neuro Letters"}
        }))
        .unwrap();

        let record = paper_to_record(paper).unwrap();
        assert_eq!(record.authors, ["Ada", "Grace"]);
        assert_eq!(record.pdf_url.as_deref(), Some("https://example.org/abc.pdf"));
        assert_eq!(record.journal.as_deref(), Some("Neuro Letters"));
        assert_eq!(record.publication_types, ["JournalArticle"]);
        assert_eq!(record.origin(), Provider::SemanticScholar);
    }

    #[test]
    fn paper_with_null_lists_keeps_record() {
        let paper: Paper = serde_json::from_value(serde_json::json!({
            "paperId": "abc",
            "title": "Sleep",
            "authors": null,
            "publicationTypes": null
        }))
        .unwrap();

        let record = paper_to_record(paper).unwrap();
        assert!(record.authors.is_empty());
        assert!(record.publication_types.is_empty());
    }

    #[test]
    fn paper_without_id_is_dropped() {
        let paper: Paper = serde_json::from_value(serde_json::json!({"title": "Orphan"})).unwrap();
        assert!(paper_to_record(paper).is_none());
    }
}
