//! Thread persistence: one JSON record per thread in a Sled tree, with a
//! DashMap hot cache checked before disk.
//!
//! The contract is plain key-value overwrite: `get` returns the stored turn
//! sequence (empty when unknown), `put` replaces it wholesale. No merge and
//! no compare-and-swap; the orchestrator serializes read-modify-write cycles
//! per thread id above this layer.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;

const DEFAULT_PATH: &str = "./data/threads";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One message exchange unit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
}

/// Persisted record for one thread. `updated_at` is maintained on every put.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub turns: Vec<Turn>,
    pub updated_at: DateTime<Utc>,
}

/// Sled-backed thread store with an in-memory hot cache.
pub struct ThreadStore {
    db: Db,
    cache: DashMap<String, Vec<Turn>>,
}

impl ThreadStore {
    /// Opens or creates the store at `./data/threads`.
    pub fn new() -> Result<Self, CoreError> {
        Self::open_path(DEFAULT_PATH)
    }

    /// Opens or creates the store at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let db = sled::open(path)?;
        Ok(Self { db, cache: DashMap::new() })
    }

    /// Returns the turn history for a thread, or empty when unknown.
    pub fn get(&self, thread_id: &str) -> Result<Vec<Turn>, CoreError> {
        if let Some(turns) = self.cache.get(thread_id) {
            return Ok(turns.clone());
        }
        let Some(bytes) = self.db.get(thread_id.as_bytes())? else {
            return Ok(Vec::new());
        };
        let record: ThreadRecord = serde_json::from_slice(&bytes)?;
        self.cache.insert(thread_id.to_string(), record.turns.clone());
        Ok(record.turns)
    }

    /// Overwrites the thread's history in place. Writes Sled first, then the
    /// cache, so a failed disk write never leaves a stale cache entry ahead
    /// of the durable state.
    pub fn put(&self, thread_id: &str, turns: Vec<Turn>) -> Result<(), CoreError> {
        let record = ThreadRecord { turns, updated_at: Utc::now() };
        let bytes = serde_json::to_vec(&record)?;
        self.db.insert(thread_id.as_bytes(), bytes)?;
        self.cache.insert(thread_id.to_string(), record.turns);
        Ok(())
    }

    /// Removes a thread entirely. Unknown ids are a no-op.
    pub fn delete(&self, thread_id: &str) -> Result<(), CoreError> {
        self.db.remove(thread_id.as_bytes())?;
        self.cache.remove(thread_id);
        Ok(())
    }

    /// Last `n` turns of a thread, for the debug endpoint.
    pub fn tail(&self, thread_id: &str, n: usize) -> Result<Vec<Turn>, CoreError> {
        let turns = self.get(thread_id)?;
        let skip = turns.len().saturating_sub(n);
        Ok(turns.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, ThreadStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ThreadStore::open_path(dir.path().join("threads")).unwrap();
        (dir, store)
    }

    #[test]
    fn unknown_thread_is_empty() {
        let (_dir, store) = open_temp();
        assert!(store.get("nope").unwrap().is_empty());
    }

    #[test]
    fn round_trip_preserves_order() {
        let (_dir, store) = open_temp();
        let turns = vec![
            Turn::user("hello"),
            Turn::assistant("hi"),
            Turn::user("next"),
        ];
        store.put("t1", turns.clone()).unwrap();
        assert_eq!(store.get("t1").unwrap(), turns);
    }

    #[test]
    fn get_is_idempotent() {
        let (_dir, store) = open_temp();
        store.put("t1", vec![Turn::user("a")]).unwrap();
        let first = store.get("t1").unwrap();
        let second = store.get("t1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn put_overwrites_in_place() {
        let (_dir, store) = open_temp();
        store.put("t1", vec![Turn::user("a")]).unwrap();
        store.put("t1", vec![Turn::user("b"), Turn::assistant("c")]).unwrap();
        let turns = store.get("t1").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "b");
    }

    #[test]
    fn delete_then_get_is_empty() {
        let (_dir, store) = open_temp();
        store.put("t1", vec![Turn::user("a")]).unwrap();
        store.delete("t1").unwrap();
        assert!(store.get("t1").unwrap().is_empty());
    }

    #[test]
    fn tail_returns_last_n() {
        let (_dir, store) = open_temp();
        let turns: Vec<Turn> = (0..10).map(|i| Turn::user(format!("m{}", i))).collect();
        store.put("t1", turns).unwrap();
        let tail = store.tail("t1", 3).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].content, "m7");
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads");
        {
            let store = ThreadStore::open_path(&path).unwrap();
            store.put("t1", vec![Turn::user("persisted")]).unwrap();
        }
        let store = ThreadStore::open_path(&path).unwrap();
        assert_eq!(store.get("t1").unwrap()[0].content, "persisted");
    }
}
