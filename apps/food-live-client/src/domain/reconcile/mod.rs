//! Live/Snapshot Reconciliation
//!
//! Comments pushed over the realtime channel are buffered per topic and
//! merged with the comments of a fetched snapshot on demand.
//!
//! The merged view is the live buffer (newest first) followed by the
//! snapshot comments, deduplicated by comment id keeping the first
//! occurrence. A comment seen live therefore wins over its fetched copy.

use std::collections::{HashSet, VecDeque};

use crate::domain::feed::{Comment, FoodId};

/// Default number of live comments kept per topic.
///
/// Bounds memory on a busy topic. An evicted comment stays visible only once
/// a refetched snapshot contains it; the snapshot is refetched on rating
/// events, so on a topic with more than this many new comments and no rating
/// in between the oldest live comments drop out of the merged view. Raise it
/// through `FOODFEED_LIVE_BUFFER_CAPACITY` when that matters.
pub const DEFAULT_LIVE_CAPACITY: usize = 500;

// =============================================================================
// Live Buffer
// =============================================================================

/// Comments received live for the current topic, newest first.
#[derive(Debug, Clone)]
pub struct LiveBuffer {
    topic: Option<FoodId>,
    comments: VecDeque<Comment>,
    capacity: usize,
}

impl Default for LiveBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LIVE_CAPACITY)
    }
}

impl LiveBuffer {
    /// Create an empty buffer bounded to `capacity` entries (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topic: None,
            comments: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Drop all entries and bind the buffer to `topic`.
    pub fn reset(&mut self, topic: Option<FoodId>) {
        self.topic = topic;
        self.comments.clear();
    }

    /// Topic the buffer is bound to.
    #[must_use]
    pub const fn topic(&self) -> Option<&FoodId> {
        self.topic.as_ref()
    }

    /// Prepend a comment received for `topic`.
    ///
    /// Returns `false` and leaves the buffer untouched when `topic` is not
    /// the bound topic. The oldest entry is evicted once capacity is reached.
    pub fn push(&mut self, topic: &FoodId, comment: Comment) -> bool {
        if self.topic.as_ref() != Some(topic) {
            return false;
        }
        self.comments.push_front(comment);
        self.comments.truncate(self.capacity);
        true
    }

    /// Iterate newest first.
    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter()
    }

    /// Number of buffered comments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

/// Latest aggregate rating pushed for the current topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveRating {
    /// Average score.
    pub average: f64,
    /// Number of ratings.
    pub total: u32,
}

// =============================================================================
// Merge
// =============================================================================

/// Concatenate `live` then `snapshot`, dropping repeated ids after the first.
pub fn merge_comments<'a>(
    live: impl IntoIterator<Item = &'a Comment>,
    snapshot: impl IntoIterator<Item = &'a Comment>,
) -> Vec<Comment> {
    let mut seen = HashSet::new();
    live.into_iter()
        .chain(snapshot)
        .filter(|comment| seen.insert(comment.id.as_str()))
        .cloned()
        .collect()
}
