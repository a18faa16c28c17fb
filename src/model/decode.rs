//! Decoding for name lists that arrive in more than one shape.
//!
//! Author lists are stored and served either as `[{"name": ".."}]` or as `["..", ".."]`.
//! Everything that rebuilds a `DocumentRecord` goes through [`EncodedNames`] so the
//! decoding order (structured, then plain, then empty) is defined once.

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub(crate) struct NamedEntry {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EncodedNames {
    Structured(Vec<NamedEntry>),
    Plain(Vec<String>),
}

impl EncodedNames {
    pub fn into_names(self) -> Vec<String> {
        let names: Vec<String> = match self {
            EncodedNames::Structured(entries) => {
                entries.into_iter().filter_map(|e| e.name).collect()
            }
            EncodedNames::Plain(names) => names,
        };
        names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Decode an already-parsed JSON value; anything unrecognised becomes an empty list.
pub(crate) fn names_from_value(value: serde_json::Value) -> Vec<String> {
    match serde_json::from_value::<EncodedNames>(value) {
        Ok(encoded) => encoded.into_names(),
        Err(_) => Vec::new(),
    }
}

/// Decode a JSON-encoded column. Malformed input is logged and yields an empty list.
pub(crate) fn names_from_json(raw: Option<&str>, field: &str, document_id: &str) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<EncodedNames>(raw) {
        Ok(encoded) => encoded.into_names(),
        Err(e) => {
            warn!(%document_id, field, error = %e, "could not decode stored list, using empty");
            Vec::new()
        }
    }
}
