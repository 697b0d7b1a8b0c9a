//! Bounded version history with undo / redo.
//!
//! Versions live in a ring of fixed capacity. Pushing a new version drops any
//! redo tail first, then evicts the oldest version if the ring is full.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::adjust::Adjustments;

/// Default number of versions kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// One image version produced by loading, generating or editing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Version {
    /// Sequential id, unique within one history.
    pub id: u64,
    /// Image location: a provider URL or a `data:` URL.
    pub image_url: String,
    /// Prompt that produced the version, if any.
    pub prompt: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Display adjustments recorded with the version.
    pub adjustments: Adjustments,
}

/// A capped undo/redo history.
#[derive(Debug, Clone)]
pub struct VersionHistory {
    versions: VecDeque<Version>,
    capacity: usize,
    cursor: Option<usize>,
    next_id: u64,
    evicted: u64,
}

impl Default for VersionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl VersionHistory {
    /// Create a history holding at most `capacity` versions (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            versions: VecDeque::with_capacity(capacity),
            capacity,
            cursor: None,
            next_id: 0,
            evicted: 0,
        }
    }

    /// Record a new version and make it current.
    pub fn push(
        &mut self,
        image_url: impl Into<String>,
        prompt: Option<String>,
        adjustments: Adjustments,
    ) -> &Version {
        if let Some(cursor) = self.cursor {
            self.versions.truncate(cursor + 1);
        }
        if self.versions.len() == self.capacity {
            if let Some(old) = self.versions.pop_front() {
                self.evicted += 1;
                log::debug!("history full, evicting version {}", old.id);
            }
        }

        let version = Version {
            id: self.next_id,
            image_url: image_url.into(),
            prompt,
            timestamp: now_millis(),
            adjustments,
        };
        self.next_id += 1;
        self.versions.push_back(version);
        let last = self.versions.len() - 1;
        self.cursor = Some(last);
        &self.versions[last]
    }

    /// The current version.
    #[must_use]
    pub fn current(&self) -> Option<&Version> {
        self.cursor.and_then(|c| self.versions.get(c))
    }

    /// Step back one version.
    pub fn undo(&mut self) -> Option<&Version> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                self.versions.get(c - 1)
            }
            _ => None,
        }
    }

    /// Step forward one version.
    pub fn redo(&mut self) -> Option<&Version> {
        match self.cursor {
            Some(c) if c + 1 < self.versions.len() => {
                self.cursor = Some(c + 1);
                self.versions.get(c + 1)
            }
            _ => None,
        }
    }

    /// Whether [`undo`](Self::undo) would move.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    /// Whether [`redo`](Self::redo) would move.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.versions.len())
    }

    /// Look up a retained version by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Jump to a retained version by id.
    pub fn select(&mut self, id: u64) -> Option<&Version> {
        let pos = self.versions.iter().position(|v| v.id == id)?;
        self.cursor = Some(pos);
        self.versions.get(pos)
    }

    /// Retained versions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }

    /// Number of retained versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether no version has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Maximum number of retained versions.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many versions have been evicted so far.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Drop every version.
    pub fn clear(&mut self) {
        self.versions.clear();
        self.cursor = None;
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
