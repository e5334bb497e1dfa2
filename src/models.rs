//! Core data models used throughout Folio RAG.
//!
//! These types represent the chunks, conversation turns, and retrieval
//! results that flow through the indexing and answering pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A slice of corpus text with provenance metadata — the atomic unit of
/// retrieval. Immutable after index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// Relative path of the corpus file this chunk came from.
    pub source: String,
    /// Most recent section header above this chunk ("summary" before any header).
    pub section: String,
    /// Position of the chunk within the whole corpus, used as a
    /// deterministic tie-breaker when similarity scores are equal.
    pub seq: i64,
    pub text: String,
    /// SHA-256 of the chunk text.
    pub hash: String,
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A scored chunk returned from the vector index. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: Arc<Chunk>,
    /// Cosine similarity, higher = more relevant.
    pub score: f32,
}

/// Source citation attached to an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub section: String,
    pub snippet: String,
}

impl SourceRef {
    /// Build a citation from a retrieval result, truncating the chunk
    /// text to a short snippet on a char boundary.
    pub fn from_result(result: &RetrievalResult) -> Self {
        const SNIPPET_CHARS: usize = 160;
        let snippet: String = result.chunk.text.chars().take(SNIPPET_CHARS).collect();
        Self {
            section: result.chunk.section.clone(),
            snippet,
        }
    }
}

/// The outcome of one orchestrated query.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    pub sources: Vec<SourceRef>,
    pub processing_time_seconds: f64,
    /// Which path produced the answer: "generated", "fallback", or "apology".
    pub answered_by: String,
}
