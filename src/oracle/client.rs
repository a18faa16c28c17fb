use std::env;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::Oracle;
use super::types::{ApiError, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const TEMPERATURE: f32 = 0.2;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey")]
    ApiKeyNotSet,

    #[error("API rate limit exceeded")]
    RateLimited,

    #[error("API quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl GeminiClient {
    /// Reads `GEMINI_API_KEY`, and `GEMINI_MODEL` which overrides `fallback_model`.
    pub fn from_env(http: Client, fallback_model: Option<&str>) -> Result<Self, OracleError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| OracleError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(OracleError::ApiKeyNotSet);
        }
        let model = env::var("GEMINI_MODEL")
            .ok()
            .or_else(|| fallback_model.map(str::to_string))
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            model,
            base_url: API_BASE.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(2),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
                role: Some("user".to_string()),
            }],
            generation_config: Some(GenerationConfig {
                temperature: TEMPERATURE,
            }),
        };

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini API rate limited");
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<GenerateContentResponse>(&text)
                && let Some(err) = &body.error
            {
                let classified = classify_api_error(err);
                warn!(error = %classified, "Gemini API error");
                return Err(classified);
            }
            let end = text.floor_char_boundary(200);
            warn!(status = %status, "Gemini API error (no structured body)");
            return Err(OracleError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {}", &text[..end]),
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(err);
            warn!(error = %classified, "Gemini API error in 200 response");
            return Err(classified);
        }
        debug!(model = %self.model, "gemini completion");
        body.text().ok_or(OracleError::EmptyResponse)
    }

    /// Generate with retries on rate limits and server errors.
    pub async fn try_complete(&self, prompt: &str) -> Result<String, OracleError> {
        let mut last_err = None;
        for attempt in 0..self.max_attempts {
            match self.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < self.max_attempts {
                        let delay_ms = jittered_backoff(self.initial_backoff, attempt);
                        debug!(
                            attempt = attempt + 1,
                            delay_ms, "retrying after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(OracleError::RateLimited))
    }
}

impl Oracle for GeminiClient {
    async fn complete(&self, prompt: &str) -> Option<String> {
        match self.try_complete(prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "oracle gave no response");
                None
            }
        }
    }
}

fn is_retriable(e: &OracleError) -> bool {
    matches!(
        e,
        OracleError::RateLimited
            | OracleError::Api {
                code: 500..=599,
                ..
            }
    )
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(initial: Duration, attempt: u32) -> u64 {
    let initial_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
    let base = initial_ms.saturating_mul(2u64.saturating_pow(attempt));
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn classify_api_error(err: &ApiError) -> OracleError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match err.code {
        Some(429) => OracleError::RateLimited,
        Some(403) => OracleError::QuotaExhausted(message),
        Some(code) => OracleError::Api { code, message },
        None => OracleError::Api {
            code: 0,
            message: format!("Unknown error (no status code): {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_429_as_rate_limited() {
        let err = ApiError {
            code: Some(429),
            message: Some("Resource exhausted".into()),
        };
        assert!(matches!(classify_api_error(&err), OracleError::RateLimited));
    }

    #[test]
    fn classify_403_as_quota_exhausted() {
        let err = ApiError {
            code: Some(403),
            message: Some("Quota exceeded".into()),
        };
        assert!(matches!(
            classify_api_error(&err),
            OracleError::QuotaExhausted(_)
        ));
    }

    #[test]
    fn only_rate_limits_and_server_errors_retry() {
        assert!(is_retriable(&OracleError::RateLimited));
        assert!(is_retriable(&OracleError::Api {
            code: 503,
            message: String::new()
        }));
        assert!(!is_retriable(&OracleError::Api {
            code: 400,
            message: String::new()
        }));
        assert!(!is_retriable(&OracleError::EmptyResponse));
    }

    #[test]
    fn backoff_stays_within_equal_jitter_bounds() {
        for attempt in 0..4 {
            let base = 1000 * 2u64.pow(attempt);
            let delay = jittered_backoff(Duration::from_secs(1), attempt);
            assert!(delay >= base / 2 && delay < base, "attempt {attempt}: {delay}");
        }
    }
}
