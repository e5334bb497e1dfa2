//! RAG chain orchestration.
//!
//! Coordinates one query end to end: load history → retrieve → confidence
//! gate → assemble prompt → generate → update memory → return the answer
//! with cited sources and elapsed time. Per-query failures are fully
//! contained here and converted to degraded but valid responses; a
//! visitor never sees a raw error.
//!
//! Memory rules: a successful exchange records both turns. The
//! low-confidence fallback and the generation-failure apology record the
//! user turn only — canned text never enters history, so future prompts
//! are not polluted by non-answers.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, PromptConfig};
use crate::db;
use crate::embedding::{self, Embedder};
use crate::generation::{self, TextGenerator};
use crate::index::VectorIndex;
use crate::memory::ConversationMemory;
use crate::migrate;
use crate::models::{ChatOutcome, SourceRef, Turn};
use crate::prompt;
use crate::retriever::Retriever;

/// Canned response when retrieval confidence is too low to answer
/// without hallucinating.
pub const FALLBACK_RESPONSE: &str = "I don't have enough information in the knowledge base to \
    answer that reliably. I can help with questions about technical skills, projects, education, \
    professional experience, or contact details - try asking about one of those!";

/// Canned response when the generation backend fails or times out.
pub const APOLOGY_RESPONSE: &str = "I apologize, but I'm having trouble processing your question \
    at the moment. Please try again in a little while, or rephrase your question.";

/// Queries about the assistant itself bypass the confidence gate: they
/// legitimately match nothing in the knowledge base.
const META_INTENTS: &[&str] = &[
    "how do you work",
    "what are you",
    "how does this work",
    "chatbot",
];

/// Example questions surfaced to visitors.
pub fn suggestions() -> Vec<&'static str> {
    vec![
        "What are the main technical skills?",
        "Tell me about the featured projects",
        "What is the educational background?",
        "What experience is there with machine learning?",
        "How can I get in touch?",
    ]
}

pub struct RagChain {
    retriever: Retriever,
    memory: ConversationMemory,
    generator: Box<dyn TextGenerator>,
    prompt_config: PromptConfig,
    min_confidence: f32,
}

impl RagChain {
    pub fn new(
        retriever: Retriever,
        memory: ConversationMemory,
        generator: Box<dyn TextGenerator>,
        config: &Config,
    ) -> Self {
        Self {
            retriever,
            memory,
            generator,
            prompt_config: config.prompt.clone(),
            min_confidence: config.retrieval.min_confidence,
        }
    }

    /// Wire the full pipeline from configuration and make the index
    /// servable. Corpus problems surface loudly here, at startup, rather
    /// than as empty answers later.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.db).await?;
        migrate::apply_schema(&pool).await?;

        let embedder: Arc<dyn Embedder> = embedding::create_embedder(&config.embedding)?.into();
        let index = Arc::new(VectorIndex::new(pool, embedder.clone(), config.clone()));
        index.ensure_ready(false).await?;

        let retriever = Retriever::new(index, embedder, config.retrieval.clone());
        let memory = ConversationMemory::new(&config.memory);
        let generator = generation::create_generator(&config.generation)?;

        Ok(Self::new(retriever, memory, generator, config))
    }

    /// Answer one query for a session. Never fails outward: retrieval or
    /// generation problems degrade to canned responses.
    pub async fn query(&self, message: &str, session_id: &str) -> ChatOutcome {
        let start = Instant::now();

        let history = self.memory.get(session_id);

        let results = match self.retriever.retrieve(message, &history).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(error = %e, "retrieval failed");
                self.memory.append(session_id, Turn::user(message));
                return outcome(APOLOGY_RESPONSE, Vec::new(), "apology", start);
            }
        };

        let best_score = results.first().map(|r| r.score).unwrap_or(0.0);
        let confident = best_score >= self.min_confidence;

        if !confident && !is_meta_intent(message) {
            tracing::info!(best_score, "low retrieval confidence, returning fallback");
            self.memory.append(session_id, Turn::user(message));
            return outcome(FALLBACK_RESPONSE, Vec::new(), "fallback", start);
        }

        let prompt_text = prompt::assemble(
            message,
            &results,
            &history,
            Utc::now().date_naive(),
            &self.prompt_config,
        );

        // No memory or index lock is held across this network call
        match self.generator.complete(&prompt_text).await {
            Ok(answer) => {
                self.memory.append(session_id, Turn::user(message));
                self.memory.append(session_id, Turn::assistant(answer.clone()));

                let sources = results.iter().map(SourceRef::from_result).collect();
                outcome(&answer, sources, "generated", start)
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed, returning apology");
                // Record the user turn but never the apology text
                self.memory.append(session_id, Turn::user(message));
                outcome(APOLOGY_RESPONSE, Vec::new(), "apology", start)
            }
        }
    }

    /// Drop a session's history. Idempotent.
    pub fn clear(&self, session_id: &str) {
        self.memory.clear(session_id);
    }

    /// Current history for a session (used by tests and debugging).
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.memory.get(session_id)
    }

    /// Number of chunks the index currently serves.
    pub async fn indexed_chunks(&self) -> usize {
        self.retriever.index().len().await
    }
}

fn outcome(response: &str, sources: Vec<SourceRef>, answered_by: &str, start: Instant) -> ChatOutcome {
    ChatOutcome {
        response: response.to_string(),
        sources,
        processing_time_seconds: start.elapsed().as_secs_f64(),
        answered_by: answered_by.to_string(),
    }
}

fn is_meta_intent(message: &str) -> bool {
    let lowered = message.to_lowercase();
    META_INTENTS.iter().any(|intent| lowered.contains(intent))
}

/// CLI entry point for `folio ask` — one-shot query from the terminal.
pub async fn run_ask(config: &Config, question: &str, session: Option<String>) -> Result<()> {
    let chain = RagChain::from_config(config).await?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = chain.query(question, &session_id).await;

    println!("{}", result.response);
    if !result.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &result.sources {
            println!("  [{}] {}", source.section, source.snippet.replace('\n', " "));
        }
    }
    println!();
    println!("({:.2}s)", result.processing_time_seconds);

    Ok(())
}

/// CLI entry point for `folio suggest`.
pub fn run_suggest() {
    for s in suggestions() {
        println!("- {}", s);
    }
}
