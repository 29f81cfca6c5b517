//! Playback cache collaborator interface and passthrough wiring.
//!
//! Four cache instances exist per connected source: thumbnails,
//! waveform, decoded video frames, decoded audio. The clip does not own
//! them; it drives invalidation and recompute requests through the
//! [`PlaybackCache`] trait and keeps per-kind passthrough delegation in
//! a [`PassthroughCacheGraph`].

use splice_core::{Signal, TimeRange, TimeRangeSet};
use std::sync::Arc;
use tracing::trace;

/// The four cache kinds a connected source exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CacheKind {
    /// Preview thumbnails (video tracks, always wanted).
    Thumbnail,
    /// Audio waveform overview (audio tracks, always wanted).
    Waveform,
    /// Decoded video frames (gated by autocache).
    Frame,
    /// Decoded audio (gated by autocache).
    Audio,
}

impl CacheKind {
    /// All four kinds, in wiring order.
    pub const ALL: [CacheKind; 4] = [
        CacheKind::Thumbnail,
        CacheKind::Waveform,
        CacheKind::Frame,
        CacheKind::Audio,
    ];

    /// Thumbnails and waveforms are always requested; frame and audio
    /// caches only when the clip autocaches.
    pub fn gated_by_autocache(self) -> bool {
        matches!(self, CacheKind::Frame | CacheKind::Audio)
    }

    const fn index(self) -> usize {
        match self {
            CacheKind::Thumbnail => 0,
            CacheKind::Waveform => 1,
            CacheKind::Frame => 2,
            CacheKind::Audio => 3,
        }
    }
}

/// Notification payload for a range that finished recomputing.
///
/// Carries the ledger epoch the work was issued against so a completion
/// that raced with a newer invalidation can be recognized as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedEvent {
    /// The range that became valid.
    pub range: TimeRange,
    /// Ledger epoch at completion time.
    pub epoch: u64,
}

/// A range-addressable ledger of validated vs. invalid time spans.
///
/// Implemented by the render collaborator;
/// [`MemoryCache`](crate::memory::MemoryCache) is the in-memory
/// reference implementation. Recompute requests are fire-and-forget: completion
/// arrives later through the [`PlaybackCache::validated`] notification,
/// possibly on another thread.
pub trait PlaybackCache: Send + Sync {
    /// Mark a range as invalid.
    fn invalidate(&self, range: TimeRange);

    /// The currently invalid spans intersected with `within`.
    fn invalidated_ranges(&self, within: TimeRange) -> Vec<TimeRange>;

    /// The currently validated (computed) spans intersected with
    /// `within`.
    fn validated_ranges(&self, within: TimeRange) -> Vec<TimeRange>;

    /// Ranges currently delegated to a passthrough target.
    fn passthrough_ranges(&self) -> Vec<TimeRange>;

    /// Delegate already-computed data to `other` (same cache kind).
    fn set_passthrough(&self, other: &Arc<dyn PlaybackCache>);

    /// Revert to normal (non-delegated) bookkeeping.
    fn clear_passthrough(&self);

    /// Enqueue asynchronous recomputation of a range.
    fn request_recompute(&self, range: TimeRange);

    /// Cancel all in-flight recomputation for this cache instance.
    fn cancel_all(&self);

    /// Notification emitted when a range finishes recomputing.
    fn validated(&self) -> &Signal<ValidatedEvent>;
}

/// Per-clip record of which cache instance delegates to which.
///
/// At most one delegation target per cache kind. Wiring is directional
/// and carries no ownership; either side can be removed independently,
/// after which the dependent cache reverts to plain bookkeeping.
#[derive(Default)]
pub struct PassthroughCacheGraph {
    delegates: [Option<Arc<dyn PlaybackCache>>; 4],
}

impl PassthroughCacheGraph {
    /// A graph with no delegation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `target` as the delegate for `kind` and wire the cache.
    pub fn set_delegate(
        &mut self,
        kind: CacheKind,
        cache: &Arc<dyn PlaybackCache>,
        target: Arc<dyn PlaybackCache>,
    ) {
        cache.set_passthrough(&target);
        self.delegates[kind.index()] = Some(target);
    }

    /// Remove the delegate for `kind`, if any.
    pub fn clear_delegate(&mut self, kind: CacheKind, cache: Option<&Arc<dyn PlaybackCache>>) {
        if self.delegates[kind.index()].take().is_some() {
            if let Some(cache) = cache {
                cache.clear_passthrough();
            }
        }
    }

    /// Drop every delegation record without touching the caches
    /// (used when the source itself goes away).
    pub fn clear_all(&mut self) {
        self.delegates = Default::default();
    }

    /// The current delegate for `kind`.
    pub fn delegate(&self, kind: CacheKind) -> Option<&Arc<dyn PlaybackCache>> {
        self.delegates[kind.index()].as_ref()
    }

    /// The ranges of `cache` that still need work inside `within`:
    /// its invalidated spans minus anything covered by its passthrough.
    pub fn needed_ranges(&self, cache: &dyn PlaybackCache, within: TimeRange) -> Vec<TimeRange> {
        let mut needed: TimeRangeSet = cache.invalidated_ranges(within).into_iter().collect();
        for covered in cache.passthrough_ranges() {
            trace!(%covered, "subtracting passthrough-covered range");
            needed.remove(covered);
        }
        needed.as_slice().to_vec()
    }
}

impl std::fmt::Debug for PassthroughCacheGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let wired: Vec<CacheKind> = CacheKind::ALL
            .into_iter()
            .filter(|k| self.delegates[k.index()].is_some())
            .collect();
        f.debug_struct("PassthroughCacheGraph")
            .field("wired", &wired)
            .finish()
    }
}
