//! Prompt assembly.
//!
//! A pure function from (query, retrieval results, history, current date)
//! to the generation prompt. No side effects and no randomness, so prompt
//! contents can be unit-tested without a generation backend, and identical
//! inputs always produce the identical prompt — a prerequisite for
//! consistent answers to repeated factual questions.
//!
//! The prompt is bounded by `max_prompt_chars`. When the naive assembly
//! would exceed the budget, history turns are dropped (oldest first)
//! before any retrieved chunk is dropped (lowest score first): facts
//! outrank small-talk context.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::PromptConfig;
use crate::models::{Chunk, RetrievalResult, Turn};

/// Assemble the full generation prompt.
///
/// `results` must already be in descending score order (as returned by
/// the retriever); chunks are emitted in that order with their section
/// as a provenance tag.
pub fn assemble(
    query: &str,
    results: &[RetrievalResult],
    history: &[Turn],
    today: NaiveDate,
    config: &PromptConfig,
) -> String {
    let mut kept_history = history.len();
    let mut kept_chunks = results.len();

    loop {
        let prompt = render(
            query,
            &results[..kept_chunks],
            &history[history.len() - kept_history..],
            today,
            &config.subject,
        );
        if prompt.chars().count() <= config.max_prompt_chars {
            return prompt;
        }
        // History goes first, oldest turn at a time
        if kept_history > 0 {
            kept_history -= 1;
            continue;
        }
        // Then the lowest-scored chunks, keeping at least one
        if kept_chunks > 1 {
            kept_chunks -= 1;
            continue;
        }
        if kept_chunks == 0 {
            return prompt;
        }
        // One chunk left and still over: cut its text to the remaining
        // budget so a single oversized chunk cannot blow the limit
        let overflow = prompt.chars().count() - config.max_prompt_chars;
        let best = &results[0];
        let keep = best.chunk.text.chars().count().saturating_sub(overflow);
        let trimmed = RetrievalResult {
            chunk: Arc::new(Chunk {
                text: best.chunk.text.chars().take(keep).collect(),
                ..(*best.chunk).clone()
            }),
            score: best.score,
        };
        return render(query, &[trimmed], &[], today, &config.subject);
    }
}

fn render(
    query: &str,
    results: &[RetrievalResult],
    history: &[Turn],
    today: NaiveDate,
    subject: &str,
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "You are an AI assistant answering visitor questions about {subject} on their portfolio site.\n\n"
    ));
    out.push_str("INSTRUCTIONS:\n");
    out.push_str("1. Read the CONTEXT below carefully - it contains the factual information available.\n");
    out.push_str("2. Answer the QUESTION using ONLY information from the CONTEXT.\n");
    out.push_str(
        "3. For factual data (names, dates, numbers, emails, universities), copy EXACTLY from the context - never paraphrase or recompute them.\n",
    );
    out.push_str("4. Always give the SAME answer for the SAME question - be consistent.\n");
    out.push_str(
        "5. Derived values (such as age) must be computed from facts in the context and the current date below, never guessed.\n",
    );
    out.push_str("6. Use the CONVERSATION so far to resolve follow-up questions.\n");
    out.push_str("7. If information is NOT in the context, say \"I don't have that information\".\n\n");

    out.push_str(&format!("Current date: {}\n\n", today.format("%Y-%m-%d")));

    out.push_str("CONTEXT FROM KNOWLEDGE BASE:\n");
    if results.is_empty() {
        out.push_str("(no relevant context found)\n");
    }
    for result in results {
        out.push_str(&format!("[{}] {}\n\n", result.chunk.section, result.chunk.text));
    }

    if !history.is_empty() {
        out.push_str("CONVERSATION:\n");
        for turn in history {
            out.push_str(&format!("{}: {}\n", turn.role.as_str(), turn.content));
        }
        out.push('\n');
    }

    out.push_str(&format!("QUESTION: {}\n\n", query));
    out.push_str("ANSWER (extract facts directly from the context above):");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use std::sync::Arc;

    fn result(section: &str, text: &str, seq: i64, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk: Arc::new(Chunk {
                id: format!("c{seq}"),
                source: "cv.txt".to_string(),
                section: section.to_string(),
                seq,
                text: text.to_string(),
                hash: String::new(),
            }),
            score,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 23).unwrap()
    }

    #[test]
    fn test_prompt_contains_all_parts() {
        let results = vec![
            result("Contact", "Date of Birth: June 2, 1999", 0, 0.9),
            result("Education", "MSc Data Science", 1, 0.5),
        ];
        let history = vec![Turn::user("Tell me about the education")];
        let config = PromptConfig::default();

        let prompt = assemble("How old is he?", &results, &history, today(), &config);

        assert!(prompt.contains("Current date: 2026-08-23"));
        assert!(prompt.contains("[Contact] Date of Birth: June 2, 1999"));
        assert!(prompt.contains("[Education] MSc Data Science"));
        assert!(prompt.contains("user: Tell me about the education"));
        assert!(prompt.contains("QUESTION: How old is he?"));
        assert!(prompt.contains("SAME answer for the SAME question"));
    }

    #[test]
    fn test_chunks_emitted_in_score_order() {
        let results = vec![
            result("Projects", "top chunk", 5, 0.9),
            result("Skills", "second chunk", 2, 0.4),
        ];
        let config = PromptConfig::default();
        let prompt = assemble("q", &results, &[], today(), &config);

        let top = prompt.find("top chunk").unwrap();
        let second = prompt.find("second chunk").unwrap();
        assert!(top < second);
    }

    #[test]
    fn test_deterministic() {
        let results = vec![result("Projects", "chatbot project", 0, 0.8)];
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let config = PromptConfig::default();

        let a = assemble("what projects?", &results, &history, today(), &config);
        let b = assemble("what projects?", &results, &history, today(), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_budget_drops_history_before_chunks() {
        let results = vec![
            result("Projects", &"fact ".repeat(40), 0, 0.9),
            result("Skills", &"more ".repeat(40), 1, 0.5),
        ];
        let history: Vec<Turn> = (0..20)
            .map(|i| Turn::user(format!("chatter {} {}", i, "x".repeat(50))))
            .collect();
        let config = PromptConfig {
            subject: "the portfolio owner".to_string(),
            max_prompt_chars: 1800,
        };

        let prompt = assemble("question", &results, &history, today(), &config);

        assert!(prompt.chars().count() <= 1800);
        // Retrieved content survives in full
        assert!(prompt.contains("fact fact"));
        assert!(prompt.contains("more more"));
        // The oldest chatter was dropped
        assert!(!prompt.contains("chatter 0 "));
    }

    #[test]
    fn test_budget_keeps_at_least_one_chunk() {
        let results = vec![
            result("Projects", &"alpha ".repeat(100), 0, 0.9),
            result("Skills", &"beta ".repeat(100), 1, 0.5),
        ];
        let config = PromptConfig {
            subject: "the portfolio owner".to_string(),
            max_prompt_chars: 1200,
        };

        let prompt = assemble("q", &results, &[], today(), &config);

        // Lowest-scored chunk dropped first, best chunk always kept
        assert!(prompt.contains("alpha"));
        assert!(!prompt.contains("beta"));
    }

    #[test]
    fn test_budget_trims_single_oversized_chunk() {
        let results = vec![result("Projects", &"alpha ".repeat(400), 0, 0.9)];
        let config = PromptConfig {
            subject: "the portfolio owner".to_string(),
            max_prompt_chars: 1200,
        };

        let prompt = assemble("q", &results, &[], today(), &config);

        // Even a lone chunk larger than the budget cannot blow the limit
        assert!(prompt.chars().count() <= 1200);
        assert!(prompt.contains("alpha"));
        assert!(prompt.contains("QUESTION: q"));
    }

    #[test]
    fn test_empty_results_render_placeholder() {
        let config = PromptConfig::default();
        let prompt = assemble("q", &[], &[], today(), &config);
        assert!(prompt.contains("(no relevant context found)"));
    }
}
