//! In-memory reference implementations of the collaborator interfaces.
//!
//! [`MemoryCache`] keeps the validated/invalid ledger as plain range
//! sets and logs recompute requests instead of performing work, which
//! is what the tests (and embedders without a real render backend)
//! need. Epochs implement last-invalidation-wins: a completion carrying
//! an epoch older than the ledger's is stale and ignored.

use crate::binding::{MediaSource, PreviewProvider};
use crate::cache::{CacheKind, PlaybackCache, ValidatedEvent};
use parking_lot::Mutex;
use splice_core::{Signal, TimeRange, TimeRangeSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Default)]
struct Ledger {
    invalid: TimeRangeSet,
    valid: TimeRangeSet,
    /// Snapshot of the delegate's validated coverage, taken when the
    /// passthrough was wired.
    passthrough: Option<TimeRangeSet>,
    requests: Vec<TimeRange>,
    cancel_count: usize,
    epoch: u64,
}

/// In-memory playback cache ledger.
pub struct MemoryCache {
    label: String,
    state: Mutex<Ledger>,
    validated_signal: Signal<ValidatedEvent>,
}

impl MemoryCache {
    /// Create an empty ledger. The label only shows up in logs.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(Ledger::default()),
            validated_signal: Signal::new(),
        }
    }

    /// The current ledger epoch. Bumped on every invalidation.
    pub fn current_epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Every recompute request issued so far, in order.
    pub fn requested_ranges(&self) -> Vec<TimeRange> {
        self.state.lock().requests.clone()
    }

    /// Drain the recompute-request log.
    pub fn take_requests(&self) -> Vec<TimeRange> {
        std::mem::take(&mut self.state.lock().requests)
    }

    /// How many times `cancel_all` has been called.
    pub fn cancel_count(&self) -> usize {
        self.state.lock().cancel_count
    }

    /// Report a range as recomputed, as the render worker would.
    ///
    /// `epoch` is the ledger epoch the work was issued against. If the
    /// range has been invalidated again since, the completion is stale
    /// and leaves the ledger untouched.
    pub fn mark_validated(&self, range: TimeRange, epoch: u64) {
        {
            let mut state = self.state.lock();
            if epoch < state.epoch {
                warn!(
                    cache = %self.label,
                    %range,
                    stale = epoch,
                    current = state.epoch,
                    "ignoring stale validated completion"
                );
                return;
            }
            state.invalid.remove(range);
            state.valid.insert(range);
        }
        self.validated_signal.emit(&ValidatedEvent { range, epoch });
    }
}

impl PlaybackCache for MemoryCache {
    fn invalidate(&self, range: TimeRange) {
        if range.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        debug!(cache = %self.label, %range, "invalidating range");
        state.invalid.insert(range);
        state.valid.remove(range);
        state.epoch += 1;
    }

    fn invalidated_ranges(&self, within: TimeRange) -> Vec<TimeRange> {
        self.state.lock().invalid.ranges_within(within)
    }

    fn validated_ranges(&self, within: TimeRange) -> Vec<TimeRange> {
        self.state.lock().valid.ranges_within(within)
    }

    fn passthrough_ranges(&self) -> Vec<TimeRange> {
        match &self.state.lock().passthrough {
            Some(covered) => covered.as_slice().to_vec(),
            None => Vec::new(),
        }
    }

    fn set_passthrough(&self, other: &Arc<dyn PlaybackCache>) {
        let covered: TimeRangeSet = other
            .validated_ranges(TimeRange::EVERYTHING)
            .into_iter()
            .collect();
        debug!(cache = %self.label, spans = covered.len(), "wiring passthrough");
        self.state.lock().passthrough = Some(covered);
    }

    fn clear_passthrough(&self) {
        self.state.lock().passthrough = None;
    }

    fn request_recompute(&self, range: TimeRange) {
        if range.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        debug!(cache = %self.label, %range, "recompute requested");
        state.requests.push(range);
    }

    fn cancel_all(&self) {
        let mut state = self.state.lock();
        debug!(cache = %self.label, "cancelling all in-flight work");
        state.cancel_count += 1;
    }

    fn validated(&self) -> &Signal<ValidatedEvent> {
        &self.validated_signal
    }
}

/// In-memory upstream producer with the four cache instances.
pub struct MemorySource {
    id: Uuid,
    caches: [Arc<MemoryCache>; 4],
    invalidated_signal: Signal<TimeRange>,
    preview: Mutex<Option<Arc<dyn PreviewProvider>>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    /// A fresh source with empty cache ledgers.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            caches: [
                Arc::new(MemoryCache::new("thumbnail")),
                Arc::new(MemoryCache::new("waveform")),
                Arc::new(MemoryCache::new("frame")),
                Arc::new(MemoryCache::new("audio")),
            ],
            invalidated_signal: Signal::new(),
            preview: Mutex::new(None),
        }
    }

    /// Direct access to the concrete ledger for `kind`.
    pub fn memory_cache(&self, kind: CacheKind) -> &Arc<MemoryCache> {
        match kind {
            CacheKind::Thumbnail => &self.caches[0],
            CacheKind::Waveform => &self.caches[1],
            CacheKind::Frame => &self.caches[2],
            CacheKind::Audio => &self.caches[3],
        }
    }

    /// Set (or clear) the preview provider discovered downstream of
    /// this source.
    pub fn set_preview_provider(&self, provider: Option<Arc<dyn PreviewProvider>>) {
        *self.preview.lock() = provider;
    }

    /// Report a content change over `range`, in media time.
    pub fn invalidate_media(&self, range: TimeRange) {
        self.invalidated_signal.emit(&range);
    }
}

impl MediaSource for MemorySource {
    fn source_id(&self) -> Uuid {
        self.id
    }

    fn cache(&self, kind: CacheKind) -> Option<Arc<dyn PlaybackCache>> {
        Some(self.memory_cache(kind).clone() as Arc<dyn PlaybackCache>)
    }

    fn preview_provider(&self) -> Option<Arc<dyn PreviewProvider>> {
        self.preview.lock().clone()
    }

    fn invalidated(&self) -> &Signal<TimeRange> {
        &self.invalidated_signal
    }
}

/// In-memory preview/marker provider.
pub struct MemoryPreview {
    id: Uuid,
    markers: Signal<()>,
}

impl Default for MemoryPreview {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPreview {
    /// A provider with no markers.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            markers: Signal::new(),
        }
    }

    /// Simulate a marker add/remove/modify.
    pub fn touch_markers(&self) {
        self.markers.emit(&());
    }
}

impl PreviewProvider for MemoryPreview {
    fn provider_id(&self) -> Uuid {
        self.id
    }

    fn markers_changed(&self) -> &Signal<()> {
        &self.markers
    }
}
