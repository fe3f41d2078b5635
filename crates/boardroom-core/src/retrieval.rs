//! Placeholder retrieval pipeline.
//!
//! Kept so the API contract (a citations list on every reply) is stable while
//! the actual vector store is unimplemented; `retrieve` always returns empty.

use serde::{Deserialize, Serialize};

/// One retrieved chunk with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub score: f32,
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Default)]
pub struct Retriever;

impl Retriever {
    pub async fn retrieve(&self, _query: &str, _top_k: usize) -> Vec<RetrievalResult> {
        Vec::new()
    }

    /// Formats results for prompt context injection. Unused until retrieval
    /// is real, but the shape matches what the router would consume.
    pub fn format_context(&self, results: &[RetrievalResult]) -> String {
        results
            .iter()
            .map(|r| format!("[doc:{} score={:.3}] {}", r.id, r.score, r.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
