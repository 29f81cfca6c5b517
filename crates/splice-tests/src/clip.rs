//! End-to-end scenarios for the clip core.
//!
//! Exercises the full path: source content change → time conversion →
//! cache invalidation/requests → downstream propagation, plus the
//! notification plumbing (event pumping, preview rebinding, stale
//! completions).

use parking_lot::Mutex;
use splice_clip::{
    CacheKind, Clip, MediaSource, MemoryPreview, MemorySource, PlaybackCache, PreviewProvider,
    TrackKind,
};
use splice_core::{RationalTime, TimeRange};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn t(n: i64) -> RationalTime {
    RationalTime::new(n, 1)
}

fn r(a: i64, b: i64) -> TimeRange {
    TimeRange::new(t(a), t(b))
}

struct Rig {
    clip: Clip,
    source: Arc<MemorySource>,
    downstream: Arc<Mutex<Vec<TimeRange>>>,
    _downstream_sub: splice_core::Subscription,
}

fn rig(track: TrackKind, length: i64, media_in: i64, speed: f64, reverse: bool) -> Rig {
    let mut clip = Clip::new("scenario");
    clip.set_track(Some(track));
    clip.set_length_and_media_out(t(length)).unwrap();
    clip.set_media_in(t(media_in));
    clip.set_speed(speed).unwrap();
    clip.set_reverse(reverse);

    let source = Arc::new(MemorySource::new());
    clip.connect_source(source.clone());

    let downstream = Arc::new(Mutex::new(Vec::new()));
    let sink = downstream.clone();
    let sub = clip
        .downstream_invalidated()
        .connect(move |range| sink.lock().push(*range));

    Rig {
        clip,
        source,
        downstream,
        _downstream_sub: sub,
    }
}

// ── Downstream range conversion ────────────────────────────────

#[test]
fn plain_clip_propagates_range_unchanged() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);
    rig.clip.on_source_range_invalidated(r(2, 4));
    assert_eq!(rig.downstream.lock().clone(), vec![r(2, 4)]);
}

#[test]
fn reversed_clip_mirrors_range() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, true);
    rig.clip.on_source_range_invalidated(r(2, 4));
    assert_eq!(rig.downstream.lock().clone(), vec![r(6, 8)]);
}

#[test]
fn double_speed_halves_range() {
    let mut rig = rig(TrackKind::Video, 10, 0, 2.0, false);
    rig.clip.on_source_range_invalidated(r(2, 4));
    assert_eq!(rig.downstream.lock().clone(), vec![r(1, 2)]);
}

#[test]
fn frozen_clip_invalidates_everything() {
    let mut rig = rig(TrackKind::Video, 10, 0, 0.0, false);
    rig.clip.on_source_range_invalidated(r(2, 4));
    assert_eq!(rig.downstream.lock().clone(), vec![TimeRange::EVERYTHING]);
}

// ── Notification plumbing ──────────────────────────────────────

#[test]
fn source_notification_flows_through_event_pump() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);

    rig.source.invalidate_media(r(3, 5));
    assert!(rig.downstream.lock().is_empty(), "not yet pumped");

    let handled = rig.clip.pump_events();
    assert_eq!(handled, 1);
    assert_eq!(rig.downstream.lock().clone(), vec![r(3, 5)]);
}

#[test]
fn validated_completion_signals_preview_change() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);

    let previews = Arc::new(Mutex::new(0usize));
    let sink = previews.clone();
    let _sub = rig.clip.preview_changed().connect(move |_| {
        *sink.lock() += 1;
    });

    let thumbs = rig.source.memory_cache(CacheKind::Thumbnail);
    thumbs.invalidate(r(0, 2));
    thumbs.mark_validated(r(0, 2), thumbs.current_epoch());

    rig.clip.pump_events();
    assert_eq!(*previews.lock(), 1);
}

#[test]
fn invalidation_rebinds_preview_provider_once() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);
    let provider = Arc::new(MemoryPreview::new());
    rig.source.set_preview_provider(Some(provider.clone()));

    rig.clip.on_source_range_invalidated(r(0, 1));
    rig.clip.on_source_range_invalidated(r(1, 2));
    assert_eq!(provider.markers_changed().subscriber_count(), 1);

    // Marker changes now surface as preview changes.
    let previews = Arc::new(Mutex::new(0usize));
    let sink = previews.clone();
    let _sub = rig.clip.preview_changed().connect(move |_| {
        *sink.lock() += 1;
    });
    provider.touch_markers();
    rig.clip.pump_events();
    assert_eq!(*previews.lock(), 1);
}

#[test]
fn provider_change_moves_subscription() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);
    let first = Arc::new(MemoryPreview::new());
    rig.source.set_preview_provider(Some(first.clone()));
    rig.clip.on_source_range_invalidated(r(0, 1));

    let second = Arc::new(MemoryPreview::new());
    rig.source.set_preview_provider(Some(second.clone()));
    rig.clip.on_source_range_invalidated(r(1, 2));

    assert_eq!(first.markers_changed().subscriber_count(), 0);
    assert_eq!(second.markers_changed().subscriber_count(), 1);
}

#[test]
fn disconnect_tears_down_all_subscriptions() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);
    let provider = Arc::new(MemoryPreview::new());
    rig.source.set_preview_provider(Some(provider.clone()));
    rig.clip.on_source_range_invalidated(r(0, 1));

    rig.clip.disconnect_source();

    assert_eq!(rig.source.invalidated().subscriber_count(), 0);
    assert_eq!(provider.markers_changed().subscriber_count(), 0);
    for kind in CacheKind::ALL {
        assert_eq!(
            rig.source
                .memory_cache(kind)
                .validated()
                .subscriber_count(),
            0
        );
    }
}

// ── Cache requests, autocache, passthrough ─────────────────────

#[test]
fn media_in_window_scopes_shared_cache_mutation() {
    // Two clips share a source; this clip uses media [5, 15) only.
    let mut rig = rig(TrackKind::Video, 10, 5, 1.0, false);
    rig.clip.on_source_range_invalidated(r(0, 100));

    let thumbs = rig.source.memory_cache(CacheKind::Thumbnail);
    assert_eq!(
        thumbs.invalidated_ranges(TimeRange::EVERYTHING),
        vec![r(5, 15)]
    );
}

#[test]
fn autocache_toggle_round_trip() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);
    let frames = rig.source.memory_cache(CacheKind::Frame);
    frames.invalidate(r(0, 3));
    frames.invalidate(r(7, 9));

    rig.clip.set_autocache(true);
    assert_eq!(frames.requested_ranges(), vec![r(0, 3), r(7, 9)]);

    rig.clip.set_autocache(false);
    assert_eq!(frames.cancel_count(), 1);
    assert_eq!(
        rig.source.memory_cache(CacheKind::Thumbnail).cancel_count(),
        0
    );
}

#[test]
fn split_clips_share_computed_data_via_passthrough() {
    let left = rig(TrackKind::Video, 10, 0, 1.0, false);
    let mut right = rig(TrackKind::Video, 10, 0, 1.0, false);

    // The left half already decoded [0, 6).
    let left_frames = left.source.memory_cache(CacheKind::Frame);
    left_frames.invalidate(r(0, 10));
    left_frames.mark_validated(r(0, 6), left_frames.current_epoch());

    let right_frames = right.source.memory_cache(CacheKind::Frame);
    right_frames.invalidate(r(0, 10));

    right.clip.add_cache_passthrough_from(&left.clip);
    right.clip.set_autocache(true);

    // Only the part the left half never computed is requested.
    assert_eq!(right_frames.requested_ranges(), vec![r(6, 10)]);
}

#[test]
fn stale_validated_never_revalidates_newer_invalidation() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);
    rig.clip.set_autocache(true);

    rig.clip.on_source_range_invalidated(r(0, 8));
    let frames = rig.source.memory_cache(CacheKind::Frame);
    let issued = frames.current_epoch();

    // Source changes again before the worker finishes.
    rig.clip.on_source_range_invalidated(r(2, 4));
    frames.mark_validated(r(0, 8), issued);

    assert_eq!(frames.invalidated_ranges(r(0, 10)), vec![r(0, 8)]);
}

#[test]
fn connected_to_preview_reconciles_existing_invalid_ranges() {
    let rig = rig(TrackKind::Audio, 10, 0, 1.0, false);
    let waveform = rig.source.memory_cache(CacheKind::Waveform);
    waveform.invalidate(r(2, 5));

    rig.clip.on_connected_to_preview();
    assert_eq!(waveform.requested_ranges(), vec![r(2, 5)]);
}

// ── Trim and retime interplay ──────────────────────────────────

#[test]
fn trim_then_invalidate_uses_new_window() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, false);
    rig.clip.set_length_and_media_in(t(6)).unwrap();
    // Window is now media [4, 10).
    rig.clip.on_source_range_invalidated(r(0, 100));

    let thumbs = rig.source.memory_cache(CacheKind::Thumbnail);
    assert_eq!(
        thumbs.invalidated_ranges(TimeRange::EVERYTHING),
        vec![r(4, 10)]
    );
}

#[test]
fn reversed_trim_keeps_downstream_mirror_consistent() {
    let mut rig = rig(TrackKind::Video, 10, 0, 1.0, true);
    rig.clip.set_length_and_media_out(t(8)).unwrap();
    // media_in moved to 2; window [2, 10); length 8.
    assert_eq!(rig.clip.media_in(), t(2));

    rig.clip.on_source_range_invalidated(r(2, 4));
    // media 2 → sequence 8, media 4 → sequence 6 under the mirror.
    assert_eq!(rig.downstream.lock().clone(), vec![r(6, 8)]);
}
