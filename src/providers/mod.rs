//! External bibliographic search: Semantic Scholar and OpenAlex.
//!
//! Both clients paginate until a target count is reached, pace their requests,
//! and back off on rate limits. A search never fails outright; it reports what
//! it managed to collect through [`Harvest`].

pub mod openalex;
pub mod retry;
pub mod semantic_scholar;
mod types;

use std::time::Duration;

use reqwest::{Response, StatusCode};

use crate::model::{DocumentRecord, Provider};

pub use openalex::OpenAlexClient;
pub use retry::{Pacer, PageOutcome, RetryPolicy};
pub use semantic_scholar::SemanticScholarClient;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    #[error("request rejected (HTTP {status})")]
    Rejected { status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ProviderError {
    /// Rate limits, 5xx and network failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Server { .. }
                | ProviderError::Network(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestStatus {
    Complete,
    /// Pagination stopped early; records gathered before that point are kept.
    Partial { reason: String },
}

/// Records collected for one search term.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub records: Vec<DocumentRecord>,
    pub status: HarvestStatus,
}

impl Harvest {
    pub fn complete(records: Vec<DocumentRecord>) -> Self {
        Self {
            records,
            status: HarvestStatus::Complete,
        }
    }

    pub fn partial(records: Vec<DocumentRecord>, reason: impl Into<String>) -> Self {
        Self {
            records,
            status: HarvestStatus::Partial {
                reason: reason.into(),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == HarvestStatus::Complete
    }
}

/// A paginated bibliographic search provider.
/// Implemented by the HTTP clients in this module; tests substitute mocks.
#[allow(async_fn_in_trait)]
pub trait LiteratureSearch {
    fn provider(&self) -> Provider;

    /// Collect up to `target_total` records for `term`.
    async fn search(&self, term: &str, target_total: usize) -> Harvest;
}

impl<T: LiteratureSearch> LiteratureSearch for &T {
    fn provider(&self) -> Provider {
        (**self).provider()
    }

    async fn search(&self, term: &str, target_total: usize) -> Harvest {
        (**self).search(term, target_total).await
    }
}

/// Map a non-success status to the error taxonomy, reading `Retry-After` on 429.
pub(crate) fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            retry_after: parse_retry_after(response.headers()),
        });
    }
    if status.is_server_error() {
        return Err(ProviderError::Server {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Rejected {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_transient());
        assert!(ProviderError::Server { status: 503 }.is_transient());
        assert!(!ProviderError::Rejected { status: 400 }.is_transient());
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!ProviderError::Decode(decode).is_transient());
    }

    #[test]
    fn retry_after_seconds_are_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_after_date_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }
}
