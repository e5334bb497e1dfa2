//! Per-session conversation memory.
//!
//! Histories are keyed purely by session id — no cross-session leakage is
//! permitted, since mixing another visitor's history into a prompt would
//! be an information-disclosure bug. Each session's history is capped at
//! `max_history_turns` (oldest turns evicted first), and the total number
//! of tracked sessions is capped by an LRU so memory cannot grow without
//! bound.
//!
//! Appends for one session are serialized by a per-session mutex;
//! different sessions never block each other beyond the brief registry
//! lock.

use lru::LruCache;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::config::MemoryConfig;
use crate::models::Turn;

type SessionHistory = Arc<Mutex<VecDeque<Turn>>>;

pub struct ConversationMemory {
    sessions: Mutex<LruCache<String, SessionHistory>>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(config: &MemoryConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_sessions.max(1)).unwrap();
        Self {
            sessions: Mutex::new(LruCache::new(cap)),
            max_turns: config.max_history_turns,
        }
    }

    fn session(&self, session_id: &str) -> SessionHistory {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(history) = sessions.get(session_id) {
            return history.clone();
        }
        let history: SessionHistory = Arc::new(Mutex::new(VecDeque::new()));
        sessions.put(session_id.to_string(), history.clone());
        history
    }

    /// Append a turn, evicting from the front when the cap is exceeded.
    pub fn append(&self, session_id: &str, turn: Turn) {
        let history = self.session(session_id);
        let mut history = history.lock().unwrap();
        history.push_back(turn);
        while history.len() > self.max_turns {
            history.pop_front();
        }
    }

    /// Current history for a session, oldest first. An unknown session
    /// yields an empty history, never an error.
    pub fn get(&self, session_id: &str) -> Vec<Turn> {
        let existing = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.get(session_id).cloned()
        };
        match existing {
            Some(history) => history.lock().unwrap().iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Discard a session's history. Idempotent: clearing an unknown or
    /// already-empty session succeeds silently.
    pub fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.pop(session_id);
    }

    /// Number of sessions currently tracked.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}
