//! Query text parsing.

use crate::index::key::{self, SEPARATOR};

/// A normalized, tokenized query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    tokens: Vec<String>,
}

impl Query {
    /// Normalizes `text` like a search key and splits it into word tokens.
    pub fn parse(text: &str) -> Self {
        let normalized = key::normalize(text);
        let tokens = key::split_tokens(&normalized)
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            text: text.to_string(),
            tokens,
        }
    }

    /// The raw text as typed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The token that drives shard selection.
    pub fn first_token(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Tokens joined back into one key, for exact-match comparison.
    pub fn key(&self) -> String {
        self.tokens.join(SEPARATOR)
    }

    pub fn token_refs(&self) -> Vec<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }
}
