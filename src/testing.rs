//! Test doubles shared across module tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::fetch::FullTextSource;
use crate::model::{DocumentRecord, Provider};
use crate::oracle::Oracle;
use crate::providers::{Harvest, LiteratureSearch};

/// Replies from a script in order and records every prompt it receives.
pub(crate) struct ScriptedOracle {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(Into::into)).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Oracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Option<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies.lock().unwrap().pop_front().flatten()
    }
}

/// Answers each prompt with a rule, counting calls.
pub(crate) struct RuleOracle<F> {
    rule: F,
    prompts: Mutex<Vec<String>>,
}

impl<F: Fn(&str) -> Option<String>> RuleOracle<F> {
    pub(crate) fn new(rule: F) -> Self {
        Self {
            rule,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

impl<F: Fn(&str) -> Option<String>> Oracle for RuleOracle<F> {
    async fn complete(&self, prompt: &str) -> Option<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.rule)(prompt)
    }
}

/// Serves a fixed record list and records the terms searched.
pub(crate) struct FixedSearch {
    provider: Provider,
    records: Vec<DocumentRecord>,
    terms: Mutex<Vec<String>>,
}

impl FixedSearch {
    pub(crate) fn new(provider: Provider, records: Vec<DocumentRecord>) -> Self {
        Self {
            provider,
            records,
            terms: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn empty(provider: Provider) -> Self {
        Self::new(provider, Vec::new())
    }

    pub(crate) fn searched_terms(&self) -> Vec<String> {
        self.terms.lock().unwrap().clone()
    }
}

impl LiteratureSearch for FixedSearch {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn search(&self, term: &str, target_total: usize) -> Harvest {
        self.terms.lock().unwrap().push(term.to_string());
        Harvest::complete(self.records.iter().take(target_total).cloned().collect())
    }
}

/// Full text keyed by URL; unknown URLs fail.
#[derive(Default)]
pub(crate) struct MapFullText {
    texts: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl MapFullText {
    pub(crate) fn with(mut self, url: &str, text: &str) -> Self {
        self.texts.insert(url.to_string(), text.to_string());
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl FullTextSource for MapFullText {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.texts.get(url).cloned()
    }
}

/// A minimal PDF with one line of Courier text per page.
pub(crate) fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in lines {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
