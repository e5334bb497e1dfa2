//! # Folio RAG
//!
//! A retrieval-augmented question answering assistant for a personal
//! portfolio site.
//!
//! Folio RAG indexes a small knowledge corpus (CV, project notes, contact
//! details), retrieves the most relevant chunks for each visitor question,
//! and answers grounded in that context via an OpenAI-compatible
//! generation backend. Answers cite their sources and degrade gracefully
//! to canned responses when confidence is low or the backend fails.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌───────────┐
//! │ Knowledge │──▶│   Loader     │──▶│  SQLite    │
//! │ .txt/.md  │   │ Chunk+Embed │   │ Vec index │
//! └───────────┘   └─────────────┘   └─────┬─────┘
//!                                         │
//!                  ┌──────────────────────┤
//!                  ▼                      ▼
//!            ┌──────────┐          ┌──────────┐
//!            │   CLI    │          │   HTTP   │
//!            │ (folio)  │          │  /chat   │
//!            └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! folio init                          # create database
//! folio index                         # chunk + embed the corpus
//! folio search "machine learning"     # inspect retrieval
//! folio ask "What projects exist?"    # one-shot answer
//! folio serve                         # start the chat API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Corpus loading, sectioning, chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persistent vector index with in-memory search |
//! | [`retriever`] | Conversation-aware retrieval |
//! | [`memory`] | Per-session conversation history |
//! | [`prompt`] | Prompt assembly |
//! | [`generation`] | Generation backend abstraction |
//! | [`chain`] | End-to-end query orchestration |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chain;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod loader;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retriever;
pub mod server;
