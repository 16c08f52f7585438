use std::time::{Duration, Instant};

use crate::models::VideoDescriptor;

/// Repeated navigation inputs within this window coalesce to one move.
pub const NAV_THROTTLE: Duration = Duration::from_millis(500);

/// A fetch is requested once the cursor comes within this many positions
/// of the end of the known feed.
pub const FETCH_AHEAD: usize = 3;

/// Cursor offsets kept buffered, nearest neighbors first.
const PRELOAD_OFFSETS: [isize; 4] = [-1, 1, -2, 2];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Fetching,
    Ready,
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavDirection {
    Prev,
    Next,
}

/// The feed: an append-only, URL-deduplicated list of descriptors, a
/// clamped cursor, and the fetch/navigation bookkeeping around them.
/// Owns no I/O; callers fetch batches and feed them back in.
pub struct FeedController {
    videos: Vec<VideoDescriptor>,
    cursor: usize,
    phase: FeedPhase,
    last_nav: Option<Instant>,
}

impl FeedController {
    pub fn new() -> Self {
        Self {
            videos: Vec::new(),
            cursor: 0,
            phase: FeedPhase::Idle,
            last_nav: None,
        }
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&VideoDescriptor> {
        self.videos.get(self.cursor)
    }

    /// Claim the fetch slot. Returns false while a fetch is in flight, so
    /// at most one network call races the feed at a time.
    pub fn begin_fetch(&mut self) -> bool {
        if self.phase == FeedPhase::Fetching {
            return false;
        }
        self.phase = FeedPhase::Fetching;
        true
    }

    /// Append a fetched batch, deduplicating by URL, in response order.
    /// The first non-empty batch places the cursor at 0.
    pub fn apply_batch(&mut self, batch: Vec<VideoDescriptor>) -> usize {
        let first_batch = self.videos.is_empty();
        let mut appended = 0;
        for descriptor in batch {
            if self.videos.iter().any(|v| v.url == descriptor.url) {
                continue;
            }
            self.videos.push(descriptor);
            appended += 1;
        }
        if self.videos.is_empty() {
            self.phase = FeedPhase::Empty;
        } else {
            self.phase = FeedPhase::Ready;
            if first_batch {
                self.cursor = 0;
            }
        }
        appended
    }

    pub fn fetch_failed(&mut self) {
        self.phase = if self.videos.is_empty() {
            FeedPhase::Empty
        } else {
            FeedPhase::Ready
        };
    }

    /// Move the cursor one step, clamped to the feed bounds. Returns the
    /// new cursor if the move was applied; `None` when throttled, at an
    /// edge, or the feed is empty.
    pub fn navigate(&mut self, direction: NavDirection, now: Instant) -> Option<usize> {
        if self.videos.is_empty() {
            return None;
        }
        if let Some(last) = self.last_nav {
            if now.duration_since(last) < NAV_THROTTLE {
                return None;
            }
        }
        let candidate = match direction {
            NavDirection::Next => (self.cursor + 1).min(self.videos.len() - 1),
            NavDirection::Prev => self.cursor.saturating_sub(1),
        };
        if candidate == self.cursor {
            return None;
        }
        self.cursor = candidate;
        self.last_nav = Some(now);
        Some(candidate)
    }

    /// Natural end of playback: advance by one, looping to index 0 past
    /// the end of the known list. Not throttled; independent of
    /// navigation input.
    pub fn advance_on_ended(&mut self) -> Option<usize> {
        if self.videos.is_empty() {
            return None;
        }
        self.cursor = if self.cursor + 1 >= self.videos.len() {
            0
        } else {
            self.cursor + 1
        };
        Some(self.cursor)
    }

    pub fn needs_fetch(&self) -> bool {
        self.videos.len() <= self.cursor + FETCH_AHEAD
    }

    /// URLs that should be buffered for the current cursor, nearest
    /// neighbors first, clipped to the feed bounds.
    pub fn preload_targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        for offset in PRELOAD_OFFSETS {
            let index = self.cursor as isize + offset;
            if index < 0 {
                continue;
            }
            if let Some(video) = self.videos.get(index as usize) {
                targets.push(video.url.clone());
            }
        }
        targets
    }
}

impl Default for FeedController {
    fn default() -> Self {
        Self::new()
    }
}
