//! Passage and result-set structures

use serde::{Deserialize, Serialize};

/// One retrieved candidate passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageResult {
    /// Cleaned passage text
    pub content: String,

    /// Relevance score from the search or rerank service, higher is better
    pub score: Option<f64>,

    /// Identifier of the chunk in the knowledge base
    pub source_id: Option<String>,
}

impl PassageResult {
    pub fn new(content: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            content: content.into(),
            score,
            source_id: None,
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.content[..idx]),
            None => self.content.clone(),
        }
    }
}

/// A passage carrying a rerank score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedResult {
    pub content: String,
    pub score: f64,
}

/// Final ranked output of a search pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub results: Vec<PassageResult>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PassageResult> {
        self.results.iter()
    }

    pub fn into_inner(self) -> Vec<PassageResult> {
        self.results
    }
}

impl IntoIterator for ResultSet {
    type Item = PassageResult;
    type IntoIter = std::vec::IntoIter<PassageResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
