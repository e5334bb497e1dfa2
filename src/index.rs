//! Persistent vector index with in-memory search snapshot.
//!
//! The index stores (chunk, embedding) pairs in SQLite and serves cosine
//! similarity search from an in-memory snapshot behind a readers-writer
//! lock. A rebuild takes the write lock for its whole duration, so no
//! query is ever answered against a half-built index — concurrent
//! searches block until the rebuild completes.
//!
//! Staleness detection: the persisted index records the embedding model,
//! dimensionality, and a corpus fingerprint. If any of them differ from
//! the current configuration and corpus, the index is rebuilt wholesale;
//! there is no incremental patching since the corpus is small and edits
//! are infrequent.

use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::loader;
use crate::migrate;
use crate::models::{Chunk, RetrievalResult};

/// What `ensure_ready` had to do to serve searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// In-memory snapshot already matched the corpus.
    Fresh,
    /// Restored from the persisted store without re-embedding.
    Loaded,
    /// Built (or rebuilt) from the corpus.
    Rebuilt,
}

struct Snapshot {
    chunks: Vec<Arc<Chunk>>,
    embeddings: Vec<Vec<f32>>,
    fingerprint: String,
}

pub struct VectorIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    config: Config,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl VectorIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, config: Config) -> Self {
        Self {
            pool,
            embedder,
            config,
            snapshot: RwLock::new(None),
        }
    }

    /// Make the index servable: reuse the snapshot when it matches the
    /// corpus, otherwise restore from SQLite, otherwise rebuild. The
    /// rebuild path holds the write lock end to end (blocking policy).
    pub async fn ensure_ready(&self, force: bool) -> Result<IndexStatus> {
        let corpus = loader::load_corpus(&self.config)?;

        if !force {
            let guard = self.snapshot.read().await;
            if let Some(snap) = guard.as_ref() {
                if snap.fingerprint == corpus.fingerprint {
                    return Ok(IndexStatus::Fresh);
                }
            }
        }

        let mut guard = self.snapshot.write().await;
        // Another task may have finished the same work while we waited
        if !force {
            if let Some(snap) = guard.as_ref() {
                if snap.fingerprint == corpus.fingerprint {
                    return Ok(IndexStatus::Fresh);
                }
            }
            if let Some(snap) = self.load_persisted(&corpus.fingerprint).await? {
                tracing::info!(chunks = snap.chunks.len(), "vector index loaded from store");
                *guard = Some(Arc::new(snap));
                return Ok(IndexStatus::Loaded);
            }
        }

        tracing::info!(chunks = corpus.chunks.len(), "rebuilding vector index");
        let snap = self.build(corpus.chunks, corpus.fingerprint).await?;
        *guard = Some(Arc::new(snap));
        Ok(IndexStatus::Rebuilt)
    }

    /// Embed every chunk and persist the full index in one transaction.
    async fn build(&self, chunks: Vec<Chunk>, fingerprint: String) -> Result<Snapshot> {
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.config.embedding.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let mut vecs = self.embedder.embed_batch(&texts).await?;
            for vec in &vecs {
                if vec.len() != self.embedder.dims() {
                    bail!(
                        "Embedder returned {} dims, expected {}",
                        vec.len(),
                        self.embedder.dims()
                    );
                }
            }
            embeddings.append(&mut vecs);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;

        for (chunk, vec) in chunks.iter().zip(embeddings.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, source, section, seq, text, hash) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(&chunk.section)
            .bind(chunk.seq)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(vec_to_blob(vec))
                .execute(&mut *tx)
                .await?;
        }

        let meta = [
            ("model", self.embedder.model_name().to_string()),
            ("dims", self.embedder.dims().to_string()),
            ("fingerprint", fingerprint.clone()),
            ("built_at", Utc::now().to_rfc3339()),
        ];
        for (key, value) in meta {
            sqlx::query(
                "INSERT INTO index_meta (key, value) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Snapshot {
            chunks: chunks.into_iter().map(Arc::new).collect(),
            embeddings,
            fingerprint,
        })
    }

    /// Restore a persisted index if it matches the current embedder and
    /// corpus fingerprint. Returns `None` when absent or stale.
    async fn load_persisted(&self, fingerprint: &str) -> Result<Option<Snapshot>> {
        let meta = |key: &str| {
            let pool = self.pool.clone();
            let key = key.to_string();
            async move {
                sqlx::query_scalar::<_, String>("SELECT value FROM index_meta WHERE key = ?")
                    .bind(key)
                    .fetch_optional(&pool)
                    .await
            }
        };

        let Some(stored_fingerprint) = meta("fingerprint").await? else {
            return Ok(None);
        };
        if stored_fingerprint != fingerprint {
            tracing::info!("persisted index is stale (corpus changed)");
            return Ok(None);
        }
        if meta("model").await?.as_deref() != Some(self.embedder.model_name()) {
            tracing::info!("persisted index is stale (embedding model changed)");
            return Ok(None);
        }
        if meta("dims").await? != Some(self.embedder.dims().to_string()) {
            tracing::info!("persisted index is stale (dims changed)");
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source, c.section, c.seq, c.text, c.hash, cv.embedding
            FROM chunks c
            JOIN chunk_vectors cv ON cv.chunk_id = c.id
            ORDER BY c.seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut chunks = Vec::with_capacity(rows.len());
        let mut embeddings = Vec::with_capacity(rows.len());

        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vec = blob_to_vec(&blob);
            if vec.len() != self.embedder.dims() {
                return Ok(None);
            }
            embeddings.push(vec);
            chunks.push(Arc::new(Chunk {
                id: row.get("id"),
                source: row.get("source"),
                section: row.get("section"),
                seq: row.get("seq"),
                text: row.get("text"),
                hash: row.get("hash"),
            }));
        }

        Ok(Some(Snapshot {
            chunks,
            embeddings,
            fingerprint: fingerprint.to_string(),
        }))
    }

    /// Return the `k` most similar chunks, highest cosine similarity
    /// first, ties broken by chunk sequence index. Returns fewer than `k`
    /// results when the index holds fewer chunks.
    pub async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let snap = {
            let guard = self.snapshot.read().await;
            guard
                .as_ref()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("vector index not ready"))?
        };

        let mut results: Vec<RetrievalResult> = snap
            .chunks
            .iter()
            .zip(snap.embeddings.iter())
            .map(|(chunk, vec)| RetrievalResult {
                chunk: chunk.clone(),
                score: cosine_similarity(query_embedding, vec),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.seq.cmp(&b.chunk.seq))
        });
        results.truncate(k);

        Ok(results)
    }

    /// Number of chunks currently servable, 0 before `ensure_ready`.
    pub async fn len(&self) -> usize {
        self.snapshot
            .read()
            .await
            .as_ref()
            .map(|s| s.chunks.len())
            .unwrap_or(0)
    }
}

/// CLI entry point for `folio index`.
pub async fn run_index(config: &Config, force: bool) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    migrate::apply_schema(&pool).await?;

    let embedder: Arc<dyn Embedder> = embedding::create_embedder(&config.embedding)?.into();
    let index = VectorIndex::new(pool, embedder, config.clone());

    let status = index.ensure_ready(force).await?;
    let count = index.len().await;
    match status {
        IndexStatus::Fresh | IndexStatus::Loaded => {
            println!("Index up to date ({} chunks).", count)
        }
        IndexStatus::Rebuilt => println!("Index rebuilt ({} chunks).", count),
    }

    Ok(())
}
