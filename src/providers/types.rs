//! Wire formats for the two search APIs. Every field is optional; the
//! providers omit or null anything they do not know.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct PaperSearchPage {
    pub total: Option<usize>,
    #[serde(default)]
    pub data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Paper {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub authors: serde_json::Value,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub venue: Option<String>,
    pub citation_count: Option<u32>,
    pub open_access_pdf: Option<OpenAccessPdf>,
    #[serde(default)]
    pub publication_types: serde_json::Value,
    pub journal: Option<Journal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAccessPdf {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Journal {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorksPage {
    #[serde(default)]
    pub results: Vec<Work>,
    pub meta: Option<WorksMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorksMeta {
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Work {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub publication_year: Option<i32>,
    pub cited_by_count: Option<u32>,
    pub abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    pub authorships: Vec<Authorship>,
    pub primary_location: Option<PrimaryLocation>,
    pub best_oa_location: Option<OaLocation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Authorship {
    pub author: Option<AuthorRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorRef {
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PrimaryLocation {
    pub source: Option<WorkSource>,
    pub best_oa_location: Option<OaLocation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkSource {
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OaLocation {
    pub pdf_url: Option<String>,
    pub landing_page_url: Option<String>,
}
