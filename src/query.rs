//! Full-text query construction for the local FTS5 index.

/// Proximity window for multi-word terms.
const NEAR_WINDOW: usize = 3;
/// Single-word terms at or below this many characters get no prefix wildcard.
const MAX_EXACT_ONLY_CHARS: usize = 3;

/// Trim, lowercase and drop empty terms, keeping order.
pub fn normalize_terms<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Build an FTS5 `MATCH` expression from free-text terms.
///
/// Multi-word terms become `NEAR(w1 w2 .., 3)`, longer single words emit the word
/// and a prefix variant, short words emit only the word. Clauses are OR-joined.
/// Returns an empty string when no usable term remains.
pub fn build_match_query<S: AsRef<str>>(terms: &[S]) -> String {
    let mut clauses = Vec::new();

    for term in normalize_terms(terms) {
        let words: Vec<&str> = term.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            [word] => {
                let escaped = escape_word(word);
                if word.chars().count() > MAX_EXACT_ONLY_CHARS {
                    clauses.push(escaped.clone());
                    clauses.push(format!("{escaped}*"));
                } else {
                    clauses.push(escaped);
                }
            }
            _ => {
                let escaped: Vec<String> = words.iter().map(|w| escape_word(w)).collect();
                clauses.push(format!("NEAR({}, {NEAR_WINDOW})", escaped.join(" ")));
            }
        }
    }

    clauses.join(" OR ")
}

/// FTS5 barewords may only contain alphanumerics, `_` and non-ASCII characters.
fn is_bareword(word: &str) -> bool {
    word.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || !c.is_ascii())
}

/// Quote a word as an FTS5 string when it contains syntax-significant characters.
fn escape_word(word: &str) -> String {
    if is_bareword(word) {
        word.to_string()
    } else {
        format!("\"{}\"", word.replace('"', "\"\""))
    }
}
