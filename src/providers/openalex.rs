use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::retry::{Pacer, PageOutcome, RetryPolicy, fetch_with_backoff};
use super::types::{Work, WorksPage};
use super::{Harvest, LiteratureSearch, ProviderError, check_status};
use crate::model::{DocumentRecord, Provider};

pub const API_BASE: &str = "https://api.openalex.org";
pub const PAGE_SIZE: usize = 200;
const FIRST_CURSOR: &str = "*";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cursor-paginated client for the OpenAlex works endpoint.
#[derive(Debug)]
pub struct OpenAlexClient {
    http: Client,
    base_url: String,
    mailto: Option<String>,
    page_size: usize,
    policy: RetryPolicy,
    pacer: Pacer,
}

impl OpenAlexClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: API_BASE.to_string(),
            mailto: None,
            page_size: PAGE_SIZE,
            policy: RetryPolicy::default(),
            pacer: Pacer::new(Duration::from_secs(1)),
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

    /// Contact address for the polite pool.
    pub fn with_mailto(mut self, mailto: Option<String>) -> Self {
        self.mailto = mailto.filter(|m| !m.trim().is_empty());
        self
    }

    async fn fetch_page(
        &self,
        term: &str,
        cursor: &str,
        per_page: usize,
    ) -> Result<WorksPage, ProviderError> {
        let url = format!("{}/works", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("search", term.to_string()),
            ("per-page", per_page.to_string()),
            ("cursor", cursor.to_string()),
        ];
        if let Some(mailto) = &self.mailto {
            query.push(("mailto", mailto.clone()));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let body = check_status(response)?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl LiteratureSearch for OpenAlexClient {
    fn provider(&self) -> Provider {
        Provider::OpenAlex
    }

    async fn search(&self, term: &str, target_total: usize) -> Harvest {
        let mut records = Vec::new();
        let mut cursor = FIRST_CURSOR.to_string();

        while records.len() < target_total {
            let per_page = self.page_size.min(target_total - records.len());
            let current = cursor.as_str();
            let outcome = fetch_with_backoff(&self.policy, &self.pacer, move || {
                self.fetch_page(term, current, per_page)
            })
            .await;

            let page = match outcome {
                PageOutcome::Fetched { page, .. } => page,
                PageOutcome::Exhausted { last_error, .. } => {
                    warn!(%term, error = %last_error, "openalex retries exhausted, keeping partial results");
                    return Harvest::partial(records, format!("retries exhausted: {last_error}"));
                }
                PageOutcome::Failed { error, .. } => {
                    warn!(%term, error = %error, "openalex request failed, keeping partial results");
                    return Harvest::partial(records, error.to_string());
                }
            };

            if page.results.is_empty() {
                debug!(%term, "openalex returned an empty page");
                break;
            }
            let before = records.len();
            records.extend(page.results.into_iter().filter_map(work_to_record));
            debug!(%term, collected = records.len(), "openalex page");
            if records.len() == before {
                debug!(%term, "openalex page had no usable works");
                break;
            }

            match page.meta.and_then(|m| m.next_cursor).filter(|c| !c.is_empty()) {
                Some(next) if next != cursor => cursor = next,
                _ => break,
            }
        }

        records.truncate(target_total);
        info!(%term, count = records.len(), "openalex search complete");
        Harvest::complete(records)
    }
}

fn work_to_record(work: Work) -> Option<DocumentRecord> {
    let id = work.id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())?;

    let authors = work
        .authorships
        .into_iter()
        .filter_map(|a| a.author.and_then(|author| author.display_name))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let (source, nested_oa) = match work.primary_location {
        Some(location) => (location.source, location.best_oa_location),
        None => (None, None),
    };
    let pdf_url = nested_oa
        .or(work.best_oa_location)
        .and_then(|oa| oa.pdf_url.or(oa.landing_page_url))
        .filter(|url| !url.is_empty());

    let venue = source.as_ref().and_then(|s| s.display_name.clone());
    let kind = source.and_then(|s| s.kind).filter(|k| !k.is_empty());
    let journal = match kind.as_deref() {
        Some("journal") => venue.clone(),
        _ => None,
    };

    Some(DocumentRecord {
        id,
        title: work.display_name.unwrap_or_default(),
        authors,
        year: work.publication_year,
        abstract_text: work.abstract_inverted_index.as_ref().and_then(rebuild_abstract),
        venue,
        journal,
        citation_count: work.cited_by_count,
        pdf_url,
        publication_types: kind.map(|k| vec![title_case(&k)]).unwrap_or_default(),
        origin: Some(Provider::OpenAlex),
    })
}

/// Lay words back out in position order.
fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> Option<String> {
    let mut positioned: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&pos| (pos, word.as_str())))
        .collect();
    if positioned.is_empty() {
        return None;
    }
    positioned.sort_unstable_by_key(|&(pos, _)| pos);
    let words: Vec<&str> = positioned.into_iter().map(|(_, word)| word).collect();
    Some(words.join(" "))
}

/// `book_series` -> `Book Series`.
fn title_case(kind: &str) -> String {
    kind.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(value: serde_json::Value) -> Work {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn abstract_is_rebuilt_in_position_order() {
        let index: HashMap<String, Vec<usize>> = serde_json::from_value(serde_json::json!({
            "sleep": [1],
            "We": [0],
            "study": [2, 4],
            "and": [3]
        }))
        .unwrap();
        assert_eq!(rebuild_abstract(&index).as_deref(), Some("We sleep study and study"));
        assert_eq!(rebuild_abstract(&HashMap::new()), None);
    }

    #[test]
    fn source_type_is_title_cased() {
        assert_eq!(title_case("book_series"), "Book Series");
        assert_eq!(title_case("journal"), "Journal");
        assert_eq!(title_case("REPOSITORY"), "Repository");
    }

    #[test]
    fn work_maps_location_fields() {
        let record = work_to_record(work(serde_json::json!({
            "id": "https://openalex.org/W1",
            "display_name": "Sleep and memory",
            "publication_year": 2020,
            "cited_by_count": 9,
            "authorships": [
                {"author": {"display_name": "Ada"}},
                {"author": null},
                {"author": {"display_name": " "}}
            ],
            "primary_location": {
                "source": {"display_name": "Sleep Journal", "type": "journal"},
                "best_oa_location": {"pdf_url": null, "landing_page_url": "https://example.org/w1"}
            }
        })))
        .unwrap();

        assert_eq!(record.authors, ["Ada"]);
        assert_eq!(record.venue.as_deref(), Some("Sleep Journal"));
        assert_eq!(record.journal.as_deref(), Some("Sleep Journal"));
        assert_eq!(record.pdf_url.as_deref(), Some("https://example.org/w1"));
        assert_eq!(record.publication_types, ["Journal"]);
        assert_eq!(record.origin(), Provider::OpenAlex);
    }

    #[test]
    fn non_journal_source_has_no_journal_name() {
        let record = work_to_record(work(serde_json::json!({
            "id": "W2",
            "display_name": "Proceedings paper",
            "primary_location": {"source": {"display_name": "ConfX", "type": "conference"}},
            "best_oa_location": {"pdf_url": "https://example.org/w2.pdf"}
        })))
        .unwrap();

        assert_eq!(record.journal, None);
        assert_eq!(record.pdf_url.as_deref(), Some("https://example.org/w2.pdf"));
    }

    #[test]
    fn work_without_id_is_dropped() {
        assert!(work_to_record(work(serde_json::json!({"display_name": "x"}))).is_none());
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::providers::HarvestStatus;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAlexClient {
        OpenAlexClient::new(Client::new())
            .with_base_url(&server.uri())
            .with_retry(
                RetryPolicy {
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(4),
                    max_attempts: 3,
                },
                Duration::ZERO,
            )
    }

    fn page(ids: &[&str], next: Option<&str>) -> serde_json::Value {
        let results: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "display_name": format!("Work {id}")}))
            .collect();
        serde_json::json!({"results": results, "meta": {"next_cursor": next}})
    }

    #[tokio::test]
    async fn follows_cursor_until_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("cursor", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["a", "b"], Some("c2"))))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("cursor", "c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["c"], None)))
            .mount(&server)
            .await;

        let harvest = client(&server).search("sleep", 10).await;
        let ids: Vec<_> = harvest.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(harvest.is_complete());
    }

    #[tokio::test]
    async fn requests_only_what_remains() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("per-page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["a", "b"], Some("next"))))
            .expect(1)
            .mount(&server)
            .await;

        let harvest = client(&server).search("sleep", 2).await;
        assert_eq!(harvest.records.len(), 2);
    }

    #[tokio::test]
    async fn undecodable_body_stops_with_partial_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let harvest = client(&server).search("sleep", 5).await;
        assert!(harvest.records.is_empty());
        assert!(matches!(harvest.status, HarvestStatus::Partial { .. }));
    }

    #[tokio::test]
    async fn page_without_usable_works_stops_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"display_name": "No id"}],
                "meta": {"next_cursor": "*"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let harvest = client(&server).search("sleep", 5).await;
        assert!(harvest.records.is_empty());
        assert!(harvest.is_complete());
    }

    #[tokio::test]
    async fn repeated_cursor_stops_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("cursor", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["a"], Some("same"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("cursor", "same"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["b"], Some("same"))))
            .expect(1)
            .mount(&server)
            .await;

        let harvest = client(&server).search("sleep", 10).await;
        let ids: Vec<_> = harvest.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["a"], None)))
            .mount(&server)
            .await;

        let harvest = client(&server).search("sleep", 5).await;
        assert_eq!(harvest.records.len(), 1);
        assert!(harvest.is_complete());
    }
}
