//! Cache invalidation orchestration.
//!
//! Reacts to upstream content changes and to local parameter changes:
//! converts ranges between media and sequence time with the clip's
//! [`TimeMapper`], drives the four playback caches through the
//! passthrough graph, and hands the converted range to the downstream
//! propagation path. Not internally thread-safe; runs on the clip's
//! control thread.

use crate::binding::{ClipEvent, ConnectedSourceBinding, MediaSource};
use crate::cache::{CacheKind, PassthroughCacheGraph, PlaybackCache};
use crate::clip::TrackKind;
use crate::mapper::TimeMapper;
use splice_core::{ControlSender, Signal, TimeRange};
use std::sync::Arc;
use tracing::{debug, trace};

/// The clip-level settings the coordinator consults on each event.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Which track the clip sits on; selects the applicable cache
    /// kinds. `None` while the clip is unplaced.
    pub track: Option<TrackKind>,
    /// Eager background recomputation of the frame/audio caches.
    pub autocache: bool,
    /// Master gate for the whole cache-request path.
    pub caches_enabled: bool,
}

/// Orchestrates invalidation and recomputation across the four caches
/// of the connected source.
pub struct CacheInvalidationCoordinator {
    binding: ConnectedSourceBinding,
    passthroughs: PassthroughCacheGraph,
    downstream: Signal<TimeRange>,
}

impl CacheInvalidationCoordinator {
    /// A coordinator with nothing connected. `events` receives the
    /// notifications of whatever source gets bound later.
    pub fn new(events: ControlSender<ClipEvent>) -> Self {
        Self {
            binding: ConnectedSourceBinding::new(events),
            passthroughs: PassthroughCacheGraph::new(),
            downstream: Signal::new(),
        }
    }

    /// Sequence-time invalidation ranges, converted and ready for the
    /// node-graph propagation collaborator.
    pub fn downstream(&self) -> &Signal<TimeRange> {
        &self.downstream
    }

    /// The source binding (connection state and preview provider).
    pub fn binding(&self) -> &ConnectedSourceBinding {
        &self.binding
    }

    /// Bind a newly connected upstream producer.
    pub fn connect_source(&mut self, source: Arc<dyn MediaSource>) {
        self.binding.connect(source);
    }

    /// Unbind the producer. Passthrough records pointed at the old
    /// source's caches are dropped with it.
    pub fn disconnect_source(&mut self) {
        self.binding.disconnect();
        self.passthroughs.clear_all();
    }

    fn cache(&self, kind: CacheKind) -> Option<Arc<dyn PlaybackCache>> {
        self.binding.source().and_then(|s| s.cache(kind))
    }

    fn applicable_kinds(track: Option<TrackKind>) -> &'static [CacheKind] {
        match track {
            Some(kind) => kind.cache_kinds(),
            None => &[],
        }
    }

    /// Handle a content change reported by the connected source, in
    /// media time. Returns the sequence-time range that was propagated
    /// downstream.
    pub fn on_source_range_invalidated(
        &mut self,
        mapper: TimeMapper,
        policy: CachePolicy,
        media_range: TimeRange,
    ) -> TimeRange {
        if policy.caches_enabled {
            self.request_range_from_connected(mapper, policy, media_range);
        }

        // A frozen clip shows one source frame everywhere, so any
        // change to it invalidates the entire clip span; the inverse
        // mapping is undefined and must not be consulted.
        let adjusted = if mapper.is_frozen() {
            TimeRange::EVERYTHING
        } else {
            mapper.output_time_adjustment(media_range)
        };

        // The producer feeding the preview path may have changed along
        // with the content; rebind (idempotent when it has not).
        let provider = self.binding.source().and_then(|s| s.preview_provider());
        self.binding.bind_preview_provider(provider);

        debug!(%media_range, %adjusted, "propagating source invalidation");
        self.downstream.emit(&adjusted);
        adjusted
    }

    /// Invalidate (and, where wanted, request recomputation of) the
    /// affected portion of each applicable cache.
    pub fn request_range_from_connected(
        &self,
        mapper: TimeMapper,
        policy: CachePolicy,
        media_range: TimeRange,
    ) {
        let window = mapper.visible_media_window();
        for kind in Self::applicable_kinds(policy.track) {
            let Some(cache) = self.cache(*kind) else {
                continue;
            };
            let request = !kind.gated_by_autocache() || policy.autocache;
            Self::request_range_for_cache(cache.as_ref(), window, media_range, true, request);
        }
    }

    /// Recompute-only sweep: re-request everything still invalid in the
    /// applicable caches, after passthrough subtraction. Used when
    /// autocaching turns on or a new connection is reconciled.
    pub fn request_invalidated_from_connected(&self, mapper: TimeMapper, policy: CachePolicy) {
        let window = mapper.visible_media_window();
        for kind in Self::applicable_kinds(policy.track) {
            if kind.gated_by_autocache() && !policy.autocache {
                continue;
            }
            let Some(cache) = self.cache(*kind) else {
                continue;
            };
            for range in self.passthroughs.needed_ranges(cache.as_ref(), window) {
                trace!(kind = ?kind, %range, "re-requesting invalidated range");
                Self::request_range_for_cache(cache.as_ref(), window, range, false, true);
            }
        }
    }

    /// React to the autocache flag changing. On: sweep. Off: cancel
    /// in-flight work on the gated cache; thumbnails and waveforms are
    /// always wanted and never cancelled here.
    pub fn on_autocache_toggled(&self, mapper: TimeMapper, policy: CachePolicy) {
        if policy.autocache {
            self.request_invalidated_from_connected(mapper, policy);
            return;
        }

        let cancelled = match policy.track {
            Some(TrackKind::Video) => self.cache(CacheKind::Frame),
            Some(TrackKind::Audio) => self.cache(CacheKind::Audio),
            None => None,
        };
        if let Some(cache) = cancelled {
            cache.cancel_all();
        }
    }

    /// Wire all four cache kinds of `other`'s source as passthrough
    /// targets of this clip's caches (e.g. after a split, so already
    /// computed data is not recomputed).
    pub fn add_cache_passthrough_from(&mut self, other: &CacheInvalidationCoordinator) {
        for kind in CacheKind::ALL {
            let Some(mine) = self.cache(kind) else {
                continue;
            };
            let Some(theirs) = other.cache(kind) else {
                continue;
            };
            self.passthroughs.set_delegate(kind, &mine, theirs);
        }
    }

    /// Remove the passthrough for one cache kind, reverting it to plain
    /// bookkeeping.
    pub fn remove_cache_passthrough(&mut self, kind: CacheKind) {
        let cache = self.cache(kind);
        self.passthroughs.clear_delegate(kind, cache.as_ref());
    }

    /// The passthrough wiring (read access for tests and tools).
    pub fn passthroughs(&self) -> &PassthroughCacheGraph {
        &self.passthroughs
    }

    fn request_range_for_cache(
        cache: &dyn PlaybackCache,
        window: TimeRange,
        range: TimeRange,
        invalidate: bool,
        request: bool,
    ) {
        // Caches are shared with other clips referencing the same
        // source; mutation is always scoped to this clip's window.
        let Some(scoped) = range.intersection(window) else {
            return;
        };
        if invalidate {
            cache.invalidate(scoped);
        }
        if request {
            cache.request_recompute(scoped);
        }
    }
}

impl std::fmt::Debug for CacheInvalidationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidationCoordinator")
            .field("binding", &self.binding)
            .field("passthroughs", &self.passthroughs)
            .finish()
    }
}
