//! Full text for escalation: guarded download, charset decode, readable Markdown or PDF text.

mod converter;
mod extractor;
mod ssrf;

use converter::{BodyKind, decode_body, html_to_markdown, pdf_to_text, tidy};
use extractor::readable_html;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

pub use ssrf::{DnsResolver, TokioDnsResolver};

use crate::model::truncate_chars;

pub const DEFAULT_MAX_BYTES: usize = 10_000_000;
pub const DEFAULT_MAX_CHARS: usize = 100_000;
/// Pages of a PDF read before giving up on the rest.
pub const MAX_PDF_PAGES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocked: internal/private host not allowed")]
    InternalHost,

    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("response too large (>{0} bytes)")]
    TooLarge(usize),

    #[error("unsupported content type: {0}")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("no text in response")]
    Empty,
}

/// Somewhere to get a document's full text from by URL.
#[allow(async_fn_in_trait)]
pub trait FullTextSource {
    /// Readable text, or `None` on any failure.
    async fn fetch_text(&self, url: &str) -> Option<String>;
}

impl<T: FullTextSource> FullTextSource for &T {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        (**self).fetch_text(url).await
    }
}

struct Download {
    final_url: Url,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Fetches HTML, plain-text and PDF documents from public hosts.
#[derive(Debug, Clone)]
pub struct WebFullText<R = TokioDnsResolver> {
    http: Client,
    resolver: R,
    max_bytes: usize,
    max_chars: usize,
}

impl WebFullText {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            resolver: TokioDnsResolver,
            max_bytes: DEFAULT_MAX_BYTES,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl<R: DnsResolver> WebFullText<R> {
    pub fn with_resolver<R2: DnsResolver>(self, resolver: R2) -> WebFullText<R2> {
        WebFullText {
            http: self.http,
            resolver,
            max_bytes: self.max_bytes,
            max_chars: self.max_chars,
        }
    }

    pub fn with_limits(mut self, max_bytes: usize, max_chars: usize) -> Self {
        self.max_bytes = max_bytes;
        self.max_chars = max_chars;
        self
    }

    /// Guard, download, and convert `raw`, re-checking the host after redirects.
    pub async fn fetch(&self, raw: &str) -> Result<String, FetchError> {
        let url = ssrf::guard_url(raw, &self.resolver).await?;
        let page = self.download(url).await?;
        if page.final_url.as_str() != raw {
            ssrf::guard_url(page.final_url.as_str(), &self.resolver).await?;
        }
        self.render(&page)
    }

    async fn download(&self, url: Url) -> Result<Download, FetchError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if BodyKind::from_content_type(content_type.as_deref()) == BodyKind::Unsupported {
            return Err(FetchError::Unsupported(content_type.unwrap_or_default()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.max_bytes
        {
            return Err(FetchError::TooLarge(self.max_bytes));
        }

        let final_url = response.url().clone();
        let mut body = Vec::new();
        let mut stream = response;
        while let Some(chunk) = stream.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }
        }

        Ok(Download {
            final_url,
            content_type,
            body,
        })
    }

    fn render(&self, page: &Download) -> Result<String, FetchError> {
        let content_type = page.content_type.as_deref();
        let text = match BodyKind::of_response(content_type, &page.body) {
            BodyKind::Html => {
                let decoded = decode_body(&page.body, content_type);
                html_to_markdown(&readable_html(&decoded, Some(page.final_url.as_str())))
            }
            BodyKind::PlainText => tidy(&decode_body(&page.body, content_type)),
            BodyKind::Pdf => pdf_to_text(&page.body, MAX_PDF_PAGES)?,
            BodyKind::Unsupported => {
                return Err(FetchError::Unsupported(
                    content_type.unwrap_or_default().to_string(),
                ));
            }
        };
        if text.is_empty() {
            return Err(FetchError::Empty);
        }
        debug!(url = %page.final_url, bytes = page.body.len(), chars = text.chars().count(), "full text fetched");
        Ok(truncate_chars(&text, self.max_chars))
    }
}

impl<R: DnsResolver> FullTextSource for WebFullText<R> {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        match self.fetch(url).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(url = %ssrf::redact_credentials(url), error = %e, "full text unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejected_urls_yield_none() {
        let fetcher = WebFullText::new(Client::new());
        for url in ["ftp://example.com/a.txt", "http://localhost/paper", "http://10.0.0.1/a"] {
            assert_eq!(fetcher.fetch_text(url).await, None, "{url}");
        }
    }

    struct PrivateDns;

    impl DnsResolver for PrivateDns {
        async fn lookup(&self, _host: &str, _port: u16) -> Result<Vec<std::net::IpAddr>, FetchError> {
            Ok(vec!["10.1.2.3".parse().unwrap()])
        }
    }

    #[tokio::test]
    async fn resolver_is_consulted_for_domains() {
        let fetcher = WebFullText::new(Client::new()).with_resolver(PrivateDns);
        let err = fetcher.fetch("https://papers.example.org/spindles").await.unwrap_err();
        assert!(matches!(err, FetchError::InternalHost));
        assert_eq!(fetcher.fetch_text("https://papers.example.org/spindles").await, None);
    }

    #[tokio::test]
    async fn rejection_happens_before_any_request() {
        let fetcher = WebFullText::new(Client::new());
        let err = fetcher.fetch("http://127.0.0.1:9/paper").await.unwrap_err();
        assert!(matches!(err, FetchError::InternalHost));
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ARTICLE: &str = r#"<html><head><title>Spindles</title></head><body>
<nav>Home | About</nav>
<article><h1>Spindles</h1>
<p>Spindle density during stage two sleep predicted the overnight gain in recall
of paired associates, even after controlling for total sleep time.</p>
<p>Coupling between slow oscillations and spindles was strongest over frontal
sites, consistent with accounts of hippocampal replay during sleep.</p>
<p>Participants who slept recalled markedly more word pairs than participants
who stayed awake across the same retention interval.</p>
<p>The effect survived adjustment for baseline learning and for time of day,
which rules out the simplest circadian explanations of the difference.</p>
</article></body></html>"#;

    async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) -> Url {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
        Url::parse(&format!("{}{route}", server.uri())).unwrap()
    }

    async fn fetch_local(fetcher: &WebFullText, url: Url) -> Result<String, FetchError> {
        let page = fetcher.download(url).await?;
        fetcher.render(&page)
    }

    #[tokio::test]
    async fn html_is_converted_to_markdown() {
        let server = MockServer::start().await;
        let url = serve(
            &server,
            "/paper",
            ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html; charset=utf-8"),
        )
        .await;

        let text = fetch_local(&WebFullText::new(Client::new()), url).await.unwrap();
        assert!(text.contains("Spindle density"));
        assert!(!text.contains("<p>"));
    }

    #[tokio::test]
    async fn plain_text_passes_through_with_charset() {
        let server = MockServer::start().await;
        let url = serve(
            &server,
            "/paper.txt",
            ResponseTemplate::new(200)
                .set_body_raw(vec![0x63, 0x61, 0x66, 0xE9], "text/plain; charset=iso-8859-1"),
        )
        .await;

        let text = fetch_local(&WebFullText::new(Client::new()), url).await.unwrap();
        assert_eq!(text, "café");
    }

    #[tokio::test]
    async fn pdf_text_is_extracted() {
        let server = MockServer::start().await;
        let pdf = crate::testing::pdf_with_pages(&["Spindle density predicted recall"]);
        let url = serve(
            &server,
            "/paper.pdf",
            ResponseTemplate::new(200).set_body_raw(pdf, "application/pdf"),
        )
        .await;

        let text = fetch_local(&WebFullText::new(Client::new()), url).await.unwrap();
        assert!(text.contains("Spindle"), "{text}");
        assert!(text.contains("recall"), "{text}");
    }

    #[tokio::test]
    async fn pdf_text_is_capped_at_char_limit() {
        let server = MockServer::start().await;
        let pdf = crate::testing::pdf_with_pages(&["Spindle density predicted recall"]);
        let url = serve(
            &server,
            "/paper.pdf",
            ResponseTemplate::new(200).set_body_raw(pdf, "application/pdf"),
        )
        .await;

        let fetcher = WebFullText::new(Client::new()).with_limits(DEFAULT_MAX_BYTES, 7);
        let text = fetch_local(&fetcher, url).await.unwrap();
        assert_eq!(text.chars().count(), 10);
        assert!(text.ends_with("..."));
    }

    #[tokio::test]
    async fn corrupt_pdf_is_reported() {
        let server = MockServer::start().await;
        let url = serve(
            &server,
            "/paper.pdf",
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"),
        )
        .await;

        let err = fetch_local(&WebFullText::new(Client::new()), url).await.unwrap_err();
        assert!(matches!(err, FetchError::Pdf(_)));
    }

    #[tokio::test]
    async fn images_are_unsupported() {
        let server = MockServer::start().await;
        let url = serve(
            &server,
            "/figure.png",
            ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50, 0x4E, 0x47], "image/png"),
        )
        .await;

        let err = fetch_local(&WebFullText::new(Client::new()), url).await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(ct) if ct == "image/png"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        let url = serve(&server, "/gone", ResponseTemplate::new(404)).await;

        let err = fetch_local(&WebFullText::new(Client::new()), url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = MockServer::start().await;
        let url = serve(
            &server,
            "/big.txt",
            ResponseTemplate::new(200).set_body_raw("x".repeat(2048), "text/plain"),
        )
        .await;

        let fetcher = WebFullText::new(Client::new()).with_limits(1024, 100);
        let err = fetch_local(&fetcher, url).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge(1024)));
    }

    #[tokio::test]
    async fn text_is_capped_at_char_limit() {
        let server = MockServer::start().await;
        let url = serve(
            &server,
            "/long.txt",
            ResponseTemplate::new(200).set_body_raw("abcdefghij".repeat(10), "text/plain"),
        )
        .await;

        let fetcher = WebFullText::new(Client::new()).with_limits(DEFAULT_MAX_BYTES, 12);
        let text = fetch_local(&fetcher, url).await.unwrap();
        assert_eq!(text, "abcdefghijab...");
    }

    #[tokio::test]
    async fn blank_body_is_empty_error() {
        let server = MockServer::start().await;
        let url = serve(
            &server,
            "/blank.txt",
            ResponseTemplate::new(200).set_body_raw("  \n\n ", "text/plain"),
        )
        .await;

        let err = fetch_local(&WebFullText::new(Client::new()), url).await.unwrap_err();
        assert!(matches!(err, FetchError::Empty));
    }

    #[tokio::test]
    async fn loopback_mock_server_is_refused_by_guard() {
        let server = MockServer::start().await;
        serve(&server, "/paper", ResponseTemplate::new(200).set_body_string("hello")).await;

        let fetcher = WebFullText::new(Client::new());
        assert_eq!(fetcher.fetch_text(&format!("{}/paper", server.uri())).await, None);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
