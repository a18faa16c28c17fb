//! The judgment oracle: a text-in, text-out language model.

pub mod client;
pub mod keywords;
pub mod types;

pub use client::{GeminiClient, OracleError};
pub use keywords::{generate_keywords, terms_with_subtopic};

/// Abstraction over the language model used for judgments.
/// Implemented by `GeminiClient` for production; mock implementations used in tests.
///
/// `None` means no usable answer after the implementation's own retries.
#[allow(async_fn_in_trait)]
pub trait Oracle {
    async fn complete(&self, prompt: &str) -> Option<String>;
}

impl<T: Oracle> Oracle for &T {
    async fn complete(&self, prompt: &str) -> Option<String> {
        (**self).complete(prompt).await
    }
}
