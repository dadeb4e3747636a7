//! Textual relevance scoring over memory content

use once_cell::sync::Lazy;
use regex::Regex;

static TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("Invalid term regex"));

/// Lowercase alphanumeric terms in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    TERM.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Parsed search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<String>,
    phrase: String,
}

impl SearchQuery {
    pub fn parse(query: &str) -> Self {
        let terms = tokenize(query);
        let phrase = terms.join(" ");
        let mut unique = terms;
        unique.sort();
        unique.dedup();
        Self {
            terms: unique,
            phrase,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Sum of query-term frequencies in `content`, plus a bonus equal to the
    /// number of query terms when the whole query appears as a phrase.
    pub fn score(&self, content: &str) -> usize {
        if self.is_empty() {
            return 0;
        }
        let tokens = tokenize(content);
        let frequency: usize = self
            .terms
            .iter()
            .map(|term| tokens.iter().filter(|t| *t == term).count())
            .sum();
        if frequency == 0 {
            return 0;
        }
        let joined = tokens.join(" ");
        let bonus = if self.terms.len() > 1 && contains_phrase(&joined, &self.phrase) {
            self.terms.len()
        } else {
            0
        };
        frequency + bonus
    }
}

/// Phrase match on term boundaries.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let padded = format!(" {haystack} ");
    padded.contains(&format!(" {phrase} "))
}
