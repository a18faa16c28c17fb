use std::panic::catch_unwind;

use encoding_rs::{Encoding, UTF_8};

use super::FetchError;

/// How a response body is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BodyKind {
    Html,
    PlainText,
    Pdf,
    Unsupported,
}

impl BodyKind {
    /// Classify by `Content-Type`; a missing header is treated as HTML.
    pub(super) fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Html;
        };
        match mime_essence(content_type).as_str() {
            "text/html" | "application/xhtml+xml" => Self::Html,
            "text/plain" | "text/markdown" => Self::PlainText,
            "application/pdf" | "application/x-pdf" => Self::Pdf,
            _ => Self::Unsupported,
        }
    }

    /// Like [`BodyKind::from_content_type`], but an unlabeled body with a PDF header is a PDF.
    pub(super) fn of_response(content_type: Option<&str>, body: &[u8]) -> Self {
        match Self::from_content_type(content_type) {
            Self::Html if content_type.is_none() && body.starts_with(PDF_MAGIC) => Self::Pdf,
            kind => kind,
        }
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode with the declared charset; a BOM wins, unknown labels fall back to UTF-8.
pub(super) fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_of)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

pub(super) fn html_to_markdown(html: &str) -> String {
    tidy(&html2md::rewrite_html(html, false))
}

/// Text of the first `max_pages` pages, one blank line between pages.
pub(super) fn pdf_to_text(bytes: &[u8], max_pages: usize) -> Result<String, FetchError> {
    let pages = catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| FetchError::Pdf("parser panicked".to_string()))?
        .map_err(|e| FetchError::Pdf(e.to_string()))?;

    let text = pages
        .iter()
        .take(max_pages)
        .map(String::as_str)
        .map(tidy)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(text)
}

/// Trim trailing spaces and squeeze runs of blank lines to one.
pub(super) fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
