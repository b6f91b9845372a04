//! Greeted registry: which conversations already received the one-time welcome.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{domain::ConversationId, storage::write_atomic, Result};

/// Result of recording a first contact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The id was already present; nothing changed.
    AlreadyGreeted,
    /// Newly added and flushed to durable storage.
    Persisted,
    /// Newly added in memory, but the flush failed. After a restart this
    /// conversation may be greeted once more.
    PersistFailed(String),
}

impl MarkOutcome {
    pub fn newly_added(&self) -> bool {
        !matches!(self, Self::AlreadyGreeted)
    }
}

/// Persistence port for the greeted set.
///
/// `mark_greeted` is a check-and-insert: two concurrent first messages from
/// the same conversation yield exactly one `newly_added()` outcome.
pub trait GreetedStore: Send + Sync {
    fn contains(&self, id: &ConversationId) -> bool;
    fn mark_greeted(&self, id: &ConversationId) -> MarkOutcome;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry (tests, dry runs).
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    ids: Mutex<HashSet<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }
}

impl GreetedStore for MemoryRegistry {
    fn contains(&self, id: &ConversationId) -> bool {
        lock(&self.ids).contains(id.as_str())
    }

    fn mark_greeted(&self, id: &ConversationId) -> MarkOutcome {
        if lock(&self.ids).insert(id.0.clone()) {
            MarkOutcome::Persisted
        } else {
            MarkOutcome::AlreadyGreeted
        }
    }

    fn len(&self) -> usize {
        lock(&self.ids).len()
    }
}

/// Registry mirrored to a JSON array of strings on disk.
///
/// The whole set is rewritten on every insertion (atomic replace).
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    ids: Mutex<HashSet<String>>,
}

impl JsonFileRegistry {
    /// Load the registry. A missing or unreadable file yields an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match read_ids(&path) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "could not read greeted registry, starting empty: {e}"
                );
                HashSet::new()
            }
        };
        Self {
            path,
            ids: Mutex::new(ids),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, ids: &HashSet<String>) -> Result<()> {
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        let txt = serde_json::to_string_pretty(&sorted)?;
        write_atomic(&self.path, txt.as_bytes())
    }
}

impl GreetedStore for JsonFileRegistry {
    fn contains(&self, id: &ConversationId) -> bool {
        lock(&self.ids).contains(id.as_str())
    }

    fn mark_greeted(&self, id: &ConversationId) -> MarkOutcome {
        let mut ids = lock(&self.ids);
        if !ids.insert(id.0.clone()) {
            return MarkOutcome::AlreadyGreeted;
        }
        match self.flush(&ids) {
            Ok(()) => MarkOutcome::Persisted,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    conversation = %id,
                    "could not save greeted registry: {e}"
                );
                MarkOutcome::PersistFailed(e.to_string())
            }
        }
    }

    fn len(&self) -> usize {
        lock(&self.ids).len()
    }
}

fn read_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(HashSet::new());
    }
    // Non-array JSON (or non-string entries) is treated like a corrupt file.
    let ids: Vec<String> = serde_json::from_str(&txt)?;
    Ok(ids.into_iter().collect())
}

// A poisoned lock only means another handler panicked mid-insert; the set itself is still usable.
fn lock(m: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}
