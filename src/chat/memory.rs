//! Process-local transcripts of recent conversations.
//!
//! The transcript is a cache that mirrors what was said in a
//! conversation so the coordinator can skip rebuilding context from
//! the durable log. It is never authoritative: entries are lost on
//! restart, evicted when the registry is full, and concurrent turns on
//! the same conversation can race (last writer wins).
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::Serialize;

use super::models::{Role, Turn};

/// Default number of conversations kept in memory.
pub const DEFAULT_TRANSCRIPT_CAPACITY: usize = 1024;

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl From<&TranscriptEntry> for Turn {
    fn from(entry: &TranscriptEntry) -> Self {
        Turn::new(entry.role, &entry.content)
    }
}

pub type Transcript = Vec<TranscriptEntry>;

/// A bounded registry of transcripts keyed by conversation ID. The
/// least recently used conversation is evicted once `capacity` is
/// reached.
pub struct ConversationMemoryStore {
    transcripts: Mutex<LruCache<String, Transcript>>,
}

impl ConversationMemoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            transcripts: Mutex::new(LruCache::new(capacity)),
        }
    }

    // The lock is never held across an await and every operation
    // leaves the map consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Transcript>> {
        self.transcripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a copy of the transcript for a conversation, creating an
    /// empty one if it doesn't exist yet.
    pub fn get(&self, conversation_id: &str) -> Transcript {
        self.lock()
            .get_or_insert_mut(conversation_id.to_string(), Vec::new)
            .clone()
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.lock().contains(conversation_id)
    }

    pub fn append_user(&self, conversation_id: &str, text: &str) {
        self.append(conversation_id, Role::User, text);
    }

    pub fn append_assistant(&self, conversation_id: &str, text: &str) {
        self.append(conversation_id, Role::Assistant, text);
    }

    fn append(&self, conversation_id: &str, role: Role, text: &str) {
        self.lock()
            .get_or_insert_mut(conversation_id.to_string(), Vec::new)
            .push(TranscriptEntry {
                role,
                content: text.to_string(),
            });
    }

    /// Replace a conversation's transcript with turns loaded from the
    /// durable log. System turns are not part of a transcript.
    pub fn hydrate(&self, conversation_id: &str, turns: &[Turn]) {
        let transcript = turns
            .iter()
            .filter(|turn| turn.role != Role::System)
            .map(|turn| TranscriptEntry {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect();
        self.lock().put(conversation_id.to_string(), transcript);
    }

    /// Drop a conversation's transcript so the next turn reloads it
    /// from the durable log.
    pub fn forget(&self, conversation_id: &str) {
        self.lock().pop(conversation_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

impl Default for ConversationMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSCRIPT_CAPACITY)
    }
}
