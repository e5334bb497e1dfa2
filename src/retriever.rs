//! Conversation-aware retrieval.
//!
//! The retrieval query is the raw concatenation of the last few turns'
//! content plus the current question, so a follow-up like "what about
//! his degree?" after a turn about education still lands in the right
//! chunks. No learned query rewriting — the embedding input is plain
//! concatenated text.

use anyhow::Result;
use std::sync::Arc;

use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::embedding::{self, Embedder};
use crate::index::VectorIndex;
use crate::migrate;
use crate::models::{RetrievalResult, Turn};

pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self {
            index,
            embedder,
            config,
        }
    }

    /// Top-k chunks for the query, conditioned on recent history.
    /// Always returns the top k (no similarity threshold here); the
    /// orchestrator applies the confidence gate using the scores.
    pub async fn retrieve(&self, query: &str, history: &[Turn]) -> Result<Vec<RetrievalResult>> {
        let input = embedding_input(query, history, self.config.history_window);
        let query_vec = embedding::embed_query(self.embedder.as_ref(), &input).await?;
        self.index.search(&query_vec, self.config.top_k).await
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}

/// Concatenate the last `window` turns' content with the current query.
fn embedding_input(query: &str, history: &[Turn], window: usize) -> String {
    let start = history.len().saturating_sub(window);
    let mut parts: Vec<&str> = history[start..].iter().map(|t| t.content.as_str()).collect();
    parts.push(query);
    parts.join("\n")
}

/// CLI entry point for `folio search` — debug retrieval with scores.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(&config.db).await?;
    migrate::apply_schema(&pool).await?;

    let embedder: Arc<dyn Embedder> = embedding::create_embedder(&config.embedding)?.into();
    let index = Arc::new(VectorIndex::new(pool, embedder.clone(), config.clone()));
    index.ensure_ready(false).await?;

    let mut retrieval_config = config.retrieval.clone();
    if let Some(k) = limit {
        retrieval_config.top_k = k;
    }
    let retriever = Retriever::new(index, embedder, retrieval_config);
    let results = retriever.retrieve(query, &[]).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} / {}",
            i + 1,
            result.score,
            result.chunk.source,
            result.chunk.section
        );
        println!(
            "    excerpt: \"{}\"",
            result
                .chunk
                .text
                .chars()
                .take(160)
                .collect::<String>()
                .replace('\n', " ")
        );
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_input_includes_recent_turns() {
        let history = vec![
            Turn::user("Tell me about the education"),
            Turn::assistant("MSc Data Science."),
        ];
        let input = embedding_input("what about the degree?", &history, 4);
        assert!(input.contains("Tell me about the education"));
        assert!(input.contains("MSc Data Science."));
        assert!(input.ends_with("what about the degree?"));
    }

    #[test]
    fn test_embedding_input_window_limits_turns() {
        let history: Vec<Turn> = (0..10).map(|i| Turn::user(format!("turn {i}"))).collect();
        let input = embedding_input("query", &history, 2);
        assert!(!input.contains("turn 7"));
        assert!(input.contains("turn 8"));
        assert!(input.contains("turn 9"));
    }

    #[test]
    fn test_embedding_input_empty_history() {
        let input = embedding_input("just the query", &[], 4);
        assert_eq!(input, "just the query");
    }
}
