//! Request identity for out-of-order responses.
//!
//! Every outbound request gets a token. Only the most recently issued token
//! of each kind is current; responses for older tokens are discarded.

use crate::error::{Error, Result};

/// The kind of provider call a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Text-to-image generation.
    Generation,
    /// Masked inpainting edit.
    Edit,
    /// Prompt enhancement.
    Enhance,
    /// Video search.
    Search,
}

const KIND_COUNT: usize = 4;

impl RequestKind {
    fn slot(self) -> usize {
        match self {
            Self::Generation => 0,
            Self::Edit => 1,
            Self::Enhance => 2,
            Self::Search => 3,
        }
    }
}

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    id: u64,
    kind: RequestKind,
}

impl RequestToken {
    /// Monotonic request id.
    #[must_use]
    pub fn id(self) -> u64 {
        self.id
    }

    /// The kind of call this token was issued for.
    #[must_use]
    pub fn kind(self) -> RequestKind {
        self.kind
    }
}

/// Issues tokens and remembers the latest one per kind.
#[derive(Debug, Default)]
pub struct RequestTracker {
    next_id: u64,
    latest: [Option<u64>; KIND_COUNT],
}

impl RequestTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token, superseding any earlier token of the same kind.
    pub fn issue(&mut self, kind: RequestKind) -> RequestToken {
        self.next_id += 1;
        self.latest[kind.slot()] = Some(self.next_id);
        RequestToken {
            id: self.next_id,
            kind,
        }
    }

    /// Whether `token` is still the latest of its kind.
    #[must_use]
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest[token.kind.slot()] == Some(token.id)
    }

    /// Accept a response for `token` and retire it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleResponse`] if a newer request of the same kind
    /// was issued or the token was already accepted.
    pub fn accept(&mut self, token: RequestToken) -> Result<()> {
        if !self.is_current(token) {
            log::warn!("dropping stale {:?} response #{}", token.kind, token.id);
            return Err(Error::StaleResponse(token.id));
        }
        self.latest[token.kind.slot()] = None;
        Ok(())
    }

    /// Forget every outstanding token.
    pub fn cancel_all(&mut self) {
        self.latest = [None; KIND_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_request_supersedes_older_of_same_kind() {
        let mut tracker = RequestTracker::new();
        let first = tracker.issue(RequestKind::Search);
        let second = tracker.issue(RequestKind::Search);
        assert!(second.id() > first.id());
        assert!(matches!(tracker.accept(first), Err(Error::StaleResponse(id)) if id == first.id()));
        tracker.accept(second).unwrap();
    }

    #[test]
    fn kinds_are_tracked_independently() {
        let mut tracker = RequestTracker::new();
        let search = tracker.issue(RequestKind::Search);
        let enhance = tracker.issue(RequestKind::Enhance);
        assert!(tracker.is_current(search));
        assert!(tracker.is_current(enhance));
        tracker.accept(enhance).unwrap();
        tracker.accept(search).unwrap();
    }

    #[test]
    fn token_is_accepted_only_once() {
        let mut tracker = RequestTracker::new();
        let edit = tracker.issue(RequestKind::Edit);
        tracker.accept(edit).unwrap();
        assert!(tracker.accept(edit).is_err());
    }

    #[test]
    fn cancel_all_makes_everything_stale() {
        let mut tracker = RequestTracker::new();
        let generation = tracker.issue(RequestKind::Generation);
        tracker.cancel_all();
        assert!(!tracker.is_current(generation));
    }
}
