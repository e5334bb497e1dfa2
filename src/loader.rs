//! Knowledge-corpus loader and chunker.
//!
//! Reads the static corpus (plain-text and markdown files), splits each
//! file into overlapping fixed-size chunks, and attaches section metadata
//! taken from the most recent heading. Splitting is fully deterministic:
//! the same files and the same chunking configuration always produce
//! byte-identical chunk boundaries.
//!
//! Recognized heading conventions:
//! - markdown headings (`# Projects`, `## Education`)
//! - ALL-CAPS lines (`TECHNICAL SKILLS`), common in plain-text CVs
//!
//! Text before the first heading is filed under the `"summary"` section.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::Chunk;

/// Errors raised while loading the knowledge corpus. Fatal at index-build
/// time: an empty or missing corpus must never silently yield zero chunks.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("knowledge directory not found: {0}")]
    MissingDir(PathBuf),
    #[error("no .txt or .md files under knowledge directory: {0}")]
    NoFiles(PathBuf),
    #[error("knowledge corpus is empty: {0}")]
    EmptyCorpus(PathBuf),
    #[error("failed to read {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The corpus after chunking, plus the fingerprint used for staleness
/// detection against a persisted index.
#[derive(Debug)]
pub struct LoadedCorpus {
    pub chunks: Vec<Chunk>,
    /// SHA-256 over sorted relative paths, file contents, and chunking
    /// parameters. Any edit to the corpus or the chunking config changes it.
    pub fingerprint: String,
}

/// Load and chunk every corpus file under `knowledge.dir`.
pub fn load_corpus(config: &Config) -> Result<LoadedCorpus, LoadError> {
    let root = &config.knowledge.dir;
    if !root.exists() {
        return Err(LoadError::MissingDir(root.clone()));
    }

    // Collect files in sorted order for deterministic chunk sequence
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(root).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_text = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("txt") | Some("md")
        );
        if !is_text {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        files.push((relative, path.to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    if files.is_empty() {
        return Err(LoadError::NoFiles(root.clone()));
    }

    let mut hasher = Sha256::new();
    hasher.update(config.chunking.chunk_size.to_le_bytes());
    hasher.update(config.chunking.chunk_overlap.to_le_bytes());

    let mut chunks = Vec::new();
    let mut seq: i64 = 0;

    for (relative, path) in &files {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Unreadable {
            path: path.clone(),
            source: e,
        })?;

        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);

        for (section, body) in split_sections(&content) {
            for text in split_overlapping(
                &body,
                config.chunking.chunk_size,
                config.chunking.chunk_overlap,
            ) {
                chunks.push(make_chunk(relative, &section, seq, &text));
                seq += 1;
            }
        }
    }

    if chunks.is_empty() {
        return Err(LoadError::EmptyCorpus(root.clone()));
    }

    Ok(LoadedCorpus {
        chunks,
        fingerprint: format!("{:x}", hasher.finalize()),
    })
}

/// Split file content into (section label, section body) pairs, in order.
/// Lines before the first heading belong to the `"summary"` section.
fn split_sections(content: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current_label = "summary".to_string();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(label) = heading_label(line) {
            if !current_lines.is_empty() {
                sections.push((current_label.clone(), current_lines.join("\n")));
                current_lines.clear();
            }
            current_label = label;
        } else {
            current_lines.push(line);
        }
    }
    if !current_lines.is_empty() {
        sections.push((current_label, current_lines.join("\n")));
    }

    sections
}

/// Returns the section label if the line is a heading, else `None`.
fn heading_label(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Markdown heading: one or more '#' followed by the title
    if trimmed.starts_with('#') {
        let label = trimmed.trim_start_matches('#').trim();
        if !label.is_empty() {
            return Some(label.to_string());
        }
        return None;
    }

    // ALL-CAPS line heading, e.g. "TECHNICAL SKILLS"
    let has_letters = trimmed.chars().any(|c| c.is_alphabetic());
    let all_upper = trimmed
        .chars()
        .all(|c| !c.is_alphabetic() || c.is_uppercase());
    if has_letters && all_upper && trimmed.len() <= 60 {
        return Some(title_case(trimmed));
    }

    None
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split text into chunks of at most `chunk_size` characters, with
/// `chunk_overlap` characters shared between consecutive chunks so facts
/// spanning a boundary survive in at least one chunk. Splits prefer a
/// whitespace boundary in the back half of the window.
fn split_overlapping(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end < chars.len() {
            // Walk back to the last whitespace, but never past the
            // midpoint of the window
            let floor = start + chunk_size / 2;
            let mut cut = hard_end;
            while cut > floor && !chars[cut - 1].is_whitespace() {
                cut -= 1;
            }
            if cut > floor {
                cut
            } else {
                hard_end
            }
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        // Overlap is strictly smaller than chunk_size, so start advances
        start = end.saturating_sub(chunk_overlap).max(start + 1);
    }

    out
}

fn make_chunk(source: &str, section: &str, seq: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        section: section.to_string(),
        seq,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, Config, DbConfig, KnowledgeConfig};

    fn test_config(dir: &std::path::Path, chunk_size: usize, chunk_overlap: usize) -> Config {
        Config {
            knowledge: KnowledgeConfig {
                dir: dir.to_path_buf(),
            },
            db: DbConfig {
                path: dir.join("folio.sqlite"),
            },
            chunking: ChunkingConfig {
                chunk_size,
                chunk_overlap,
            },
            embedding: Default::default(),
            retrieval: Default::default(),
            generation: Default::default(),
            memory: Default::default(),
            prompt: Default::default(),
            server: Default::default(),
        }
    }

    #[test]
    fn test_missing_dir_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = test_config(&tmp.path().join("nope"), 500, 50);
        assert!(matches!(load_corpus(&cfg), Err(LoadError::MissingDir(_))));
    }

    #[test]
    fn test_no_files_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = test_config(tmp.path(), 500, 50);
        assert!(matches!(load_corpus(&cfg), Err(LoadError::NoFiles(_))));
    }

    #[test]
    fn test_empty_corpus_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("cv.txt"), "").unwrap();
        let cfg = test_config(tmp.path(), 500, 50);
        assert!(matches!(load_corpus(&cfg), Err(LoadError::EmptyCorpus(_))));
    }

    #[test]
    fn test_sections_from_markdown_headings() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("cv.md"),
            "Intro line.\n\n# Projects\nBuilt a chatbot.\n\n# Education\nMSc Data Science.",
        )
        .unwrap();
        let cfg = test_config(tmp.path(), 500, 50);
        let corpus = load_corpus(&cfg).unwrap();

        let sections: Vec<&str> = corpus.chunks.iter().map(|c| c.section.as_str()).collect();
        assert!(sections.contains(&"summary"));
        assert!(sections.contains(&"Projects"));
        assert!(sections.contains(&"Education"));
    }

    #[test]
    fn test_sections_from_caps_headings() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("cv.txt"),
            "TECHNICAL SKILLS\nPython, Rust, SQL.\n\nKEY PROJECTS\nEnterprise assistant.",
        )
        .unwrap();
        let cfg = test_config(tmp.path(), 500, 50);
        let corpus = load_corpus(&cfg).unwrap();

        let sections: Vec<&str> = corpus.chunks.iter().map(|c| c.section.as_str()).collect();
        assert!(sections.contains(&"Technical Skills"));
        assert!(sections.contains(&"Key Projects"));
    }

    #[test]
    fn test_chunk_size_respected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let long = "word ".repeat(500);
        std::fs::write(tmp.path().join("cv.txt"), &long).unwrap();
        let cfg = test_config(tmp.path(), 100, 20);
        let corpus = load_corpus(&cfg).unwrap();

        assert!(corpus.chunks.len() > 1);
        for chunk in &corpus.chunks {
            assert!(chunk.text.chars().count() <= 100, "chunk too large");
        }
    }

    #[test]
    fn test_overlap_carries_boundary_text() {
        let tmp = tempfile::TempDir::new().unwrap();
        let long = (0..200).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        std::fs::write(tmp.path().join("cv.txt"), &long).unwrap();
        let cfg = test_config(tmp.path(), 100, 30);
        let corpus = load_corpus(&cfg).unwrap();

        // The tail of each chunk must reappear at the head of the next
        for pair in corpus.chunks.windows(2) {
            let prev_tail: String = pair[0]
                .text
                .chars()
                .rev()
                .take(10)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(
                pair[1].text.contains(prev_tail.trim()),
                "overlap missing between chunks {} and {}",
                pair[0].seq,
                pair[1].seq
            );
        }
    }

    #[test]
    fn test_deterministic_boundaries() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("a.txt"),
            "EDUCATION\n".to_string() + &"fact ".repeat(300),
        )
        .unwrap();
        std::fs::write(tmp.path().join("b.md"), "# Projects\n".to_string() + &"item ".repeat(300))
            .unwrap();
        let cfg = test_config(tmp.path(), 120, 25);

        let c1 = load_corpus(&cfg).unwrap();
        let c2 = load_corpus(&cfg).unwrap();

        assert_eq!(c1.fingerprint, c2.fingerprint);
        assert_eq!(c1.chunks.len(), c2.chunks.len());
        for (a, b) in c1.chunks.iter().zip(c2.chunks.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.seq, b.seq);
            assert_eq!(a.section, b.section);
        }
    }

    #[test]
    fn test_fingerprint_tracks_corpus_and_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("cv.txt"), "Some corpus content here.").unwrap();

        let base = load_corpus(&test_config(tmp.path(), 500, 50))
            .unwrap()
            .fingerprint;

        // Different chunking config changes the fingerprint
        let other_cfg = load_corpus(&test_config(tmp.path(), 200, 20))
            .unwrap()
            .fingerprint;
        assert_ne!(base, other_cfg);

        // Edited corpus changes the fingerprint
        std::fs::write(tmp.path().join("cv.txt"), "Edited corpus content here.").unwrap();
        let edited = load_corpus(&test_config(tmp.path(), 500, 50))
            .unwrap()
            .fingerprint;
        assert_ne!(base, edited);
    }
}
