//! The timeline clip: a placed reference to a media source.
//!
//! Owns the clip's retime parameters, its link group, and the cache
//! invalidation coordinator. All mutation happens on one logical
//! control thread; notifications arriving from elsewhere are queued and
//! drained through [`Clip::pump_events`].

use crate::binding::{ClipEvent, MediaSource};
use crate::cache::CacheKind;
use crate::coordinator::{CacheInvalidationCoordinator, CachePolicy};
use crate::link::{GraphNode, LinkGroup};
use crate::mapper::TimeMapper;
use serde::{Deserialize, Serialize};
use splice_core::{ControlQueue, RationalTime, Result, Signal, SpliceError, TimeRange};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Kind of track a clip is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// The cache kinds that apply to clips on this track.
    pub fn cache_kinds(self) -> &'static [CacheKind] {
        match self {
            TrackKind::Video => &[CacheKind::Thumbnail, CacheKind::Frame],
            TrackKind::Audio => &[CacheKind::Waveform, CacheKind::Audio],
        }
    }
}

/// The persistent parameter set of a clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipParams {
    /// Length on the timeline.
    pub length: RationalTime,
    /// Offset into the source media.
    pub media_in: RationalTime,
    /// Playback speed (1.0 = normal, 0 = frozen frame).
    pub speed: f64,
    /// Play the source backwards.
    pub reverse: bool,
    /// Keep audio pitch constant under retiming (consumed by the
    /// render collaborator).
    pub maintain_audio_pitch: bool,
    /// Eagerly recompute frame/audio caches in the background.
    pub autocache: bool,
}

impl Default for ClipParams {
    fn default() -> Self {
        Self {
            length: RationalTime::ZERO,
            media_in: RationalTime::ZERO,
            speed: 1.0,
            reverse: false,
            maintain_audio_pitch: false,
            autocache: false,
        }
    }
}

/// A clip on the timeline.
pub struct Clip {
    id: Uuid,
    name: String,
    track: Option<TrackKind>,
    params: ClipParams,
    caches_enabled: bool,
    links: LinkGroup,
    events: ControlQueue<ClipEvent>,
    coordinator: CacheInvalidationCoordinator,
    preview_changed: Signal<()>,
}

impl Clip {
    /// Create an unplaced clip with default parameters.
    pub fn new(name: impl Into<String>) -> Self {
        let events = ControlQueue::new();
        let coordinator = CacheInvalidationCoordinator::new(events.sender());
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            track: None,
            params: ClipParams::default(),
            caches_enabled: true,
            links: LinkGroup::new(),
            events,
            coordinator,
            preview_changed: Signal::new(),
        }
    }

    /// Unique clip ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Clip name (displayed in UI).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name derived from track placement.
    pub fn display_name(&self) -> &'static str {
        match self.track {
            Some(TrackKind::Video) => "Video Clip",
            Some(TrackKind::Audio) => "Audio Clip",
            None => "Clip",
        }
    }

    /// The track the clip is placed on, if any.
    pub fn track(&self) -> Option<TrackKind> {
        self.track
    }

    /// Place the clip on (or remove it from) a track kind.
    pub fn set_track(&mut self, track: Option<TrackKind>) {
        self.track = track;
    }

    /// The persistent parameter set.
    pub fn params(&self) -> &ClipParams {
        &self.params
    }

    /// Length on the timeline.
    pub fn length(&self) -> RationalTime {
        self.params.length
    }

    /// Offset into the source media.
    pub fn media_in(&self) -> RationalTime {
        self.params.media_in
    }

    /// Set the media-in offset directly.
    pub fn set_media_in(&mut self, media_in: RationalTime) {
        self.params.media_in = media_in;
    }

    /// Playback speed.
    pub fn speed(&self) -> f64 {
        self.params.speed
    }

    /// Set the playback speed. Must be non-negative; zero freezes the
    /// clip on its in-point frame.
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(SpliceError::InvalidParameter(format!(
                "speed must be a non-negative finite number, got {speed}"
            )));
        }
        self.params.speed = speed;
        Ok(())
    }

    /// Whether the clip plays its source backwards.
    pub fn reverse(&self) -> bool {
        self.params.reverse
    }

    /// Toggle reverse playback.
    pub fn set_reverse(&mut self, reverse: bool) {
        self.params.reverse = reverse;
    }

    /// Whether audio pitch is maintained under retiming.
    pub fn maintain_audio_pitch(&self) -> bool {
        self.params.maintain_audio_pitch
    }

    /// Toggle pitch maintenance (consumed by the render collaborator).
    pub fn set_maintain_audio_pitch(&mut self, maintain: bool) {
        self.params.maintain_audio_pitch = maintain;
    }

    /// Whether the clip eagerly recomputes frame/audio caches.
    pub fn autocache(&self) -> bool {
        self.params.autocache
    }

    /// Toggle autocaching. Turning it on re-requests everything still
    /// invalid; turning it off cancels in-flight frame/audio work.
    pub fn set_autocache(&mut self, autocache: bool) {
        if self.params.autocache == autocache {
            return;
        }
        self.params.autocache = autocache;
        debug!(clip = %self.id, autocache, "autocache toggled");
        self.coordinator
            .on_autocache_toggled(self.mapper(), self.policy());
    }

    /// Master gate for the cache-request path. Downstream propagation
    /// is unaffected.
    pub fn caches_enabled(&self) -> bool {
        self.caches_enabled
    }

    /// Enable or disable the cache-request path.
    pub fn set_caches_enabled(&mut self, enabled: bool) {
        self.caches_enabled = enabled;
    }

    /// A time mapper for the current parameters.
    pub fn mapper(&self) -> TimeMapper {
        TimeMapper::from_params(&self.params)
    }

    fn policy(&self) -> CachePolicy {
        CachePolicy {
            track: self.track,
            autocache: self.params.autocache,
            caches_enabled: self.caches_enabled,
        }
    }

    /// Change the clip length by moving its out point.
    ///
    /// For a reversed clip the start of the visible media window must
    /// stay anchored, so `media_in` is recomputed first.
    pub fn set_length_and_media_out(&mut self, length: RationalTime) -> Result<()> {
        Self::check_length(length)?;
        if length == self.params.length {
            return Ok(());
        }
        if self.params.reverse {
            let proposed = self
                .mapper()
                .sequence_to_media_time_with(self.params.length - length, true, false);
            self.params.media_in = proposed;
        }
        self.params.length = length;
        Ok(())
    }

    /// Change the clip length by moving its in point.
    ///
    /// For a forward clip the trim delta is an unscaled sequence-time
    /// delta, so `media_in` is recomputed with the speed stage skipped.
    pub fn set_length_and_media_in(&mut self, length: RationalTime) -> Result<()> {
        Self::check_length(length)?;
        if length == self.params.length {
            return Ok(());
        }
        if !self.params.reverse {
            let proposed = self
                .mapper()
                .sequence_to_media_time_with(self.params.length - length, false, true);
            self.params.media_in = proposed;
        }
        self.params.length = length;
        Ok(())
    }

    fn check_length(length: RationalTime) -> Result<()> {
        if !length.is_finite() || length < RationalTime::ZERO {
            return Err(SpliceError::InvalidParameter(format!(
                "clip length must be finite and non-negative, got {length}"
            )));
        }
        Ok(())
    }

    /// Bind a newly connected upstream producer, subscribing its
    /// notifications.
    pub fn connect_source(&mut self, source: Arc<dyn MediaSource>) {
        self.coordinator.connect_source(source);
    }

    /// Unbind the upstream producer and drop all its subscriptions.
    pub fn disconnect_source(&mut self) {
        self.coordinator.disconnect_source();
    }

    /// Handle a content change reported by the connected source, in
    /// media time. Returns the sequence-time range propagated
    /// downstream.
    pub fn on_source_range_invalidated(&mut self, media_range: TimeRange) -> TimeRange {
        self.coordinator
            .on_source_range_invalidated(self.mapper(), self.policy(), media_range)
    }

    /// Recompute-only sweep over everything still invalid in the
    /// applicable caches.
    pub fn request_invalidated_from_connected(&self) {
        self.coordinator
            .request_invalidated_from_connected(self.mapper(), self.policy());
    }

    /// The clip became connected to a preview consumer; reconcile the
    /// caches it now feeds.
    pub fn on_connected_to_preview(&self) {
        self.request_invalidated_from_connected();
    }

    /// Share already-computed cache data with `other` (e.g. the other
    /// half of a split): wires all four cache kinds as passthroughs.
    pub fn add_cache_passthrough_from(&mut self, other: &Clip) {
        self.coordinator
            .add_cache_passthrough_from(&other.coordinator);
    }

    /// Remove the passthrough for one cache kind.
    pub fn remove_cache_passthrough(&mut self, kind: CacheKind) {
        self.coordinator.remove_cache_passthrough(kind);
    }

    /// The coordinator (cache wiring and connection state).
    pub fn coordinator(&self) -> &CacheInvalidationCoordinator {
        &self.coordinator
    }

    /// Sequence-time invalidation ranges for the node-graph propagation
    /// collaborator.
    pub fn downstream_invalidated(&self) -> &Signal<TimeRange> {
        self.coordinator.downstream()
    }

    /// Generic "preview changed" notification: any cache validated a
    /// range, or the preview provider's markers changed.
    pub fn preview_changed(&self) -> &Signal<()> {
        &self.preview_changed
    }

    /// Drain notifications queued from other execution contexts and
    /// apply them on the control thread. Returns the number handled.
    pub fn pump_events(&mut self) -> usize {
        let mut pending = Vec::new();
        self.events.pump(|event| pending.push(event));
        let handled = pending.len();
        for event in pending {
            self.dispatch(event);
        }
        handled
    }

    fn dispatch(&mut self, event: ClipEvent) {
        match event {
            ClipEvent::SourceInvalidated(range) => {
                self.on_source_range_invalidated(range);
            }
            ClipEvent::CacheValidated { .. } | ClipEvent::MarkersChanged => {
                self.preview_changed.emit(&());
            }
        }
    }

    /// Link membership changed; recompute the clip view of the peers.
    pub fn link_change_event(&mut self, links: &[Arc<dyn GraphNode>]) {
        self.links.link_change_event(links);
    }

    /// The linked peers that are clips (read by trim tooling).
    pub fn clip_links(&self) -> Vec<Arc<dyn GraphNode>> {
        self.links.clip_links()
    }
}

impl std::fmt::Debug for Clip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clip")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("track", &self.track)
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: i64) -> RationalTime {
        RationalTime::new(n, 1)
    }

    fn clip_with(length: i64, media_in: i64, speed: f64, reverse: bool) -> Clip {
        let mut clip = Clip::new("test");
        clip.set_length_and_media_out(t(length)).unwrap();
        clip.set_media_in(t(media_in));
        clip.set_speed(speed).unwrap();
        clip.set_reverse(reverse);
        clip
    }

    #[test]
    fn display_name_follows_track() {
        let mut clip = Clip::new("test");
        assert_eq!(clip.display_name(), "Clip");
        clip.set_track(Some(TrackKind::Video));
        assert_eq!(clip.display_name(), "Video Clip");
        clip.set_track(Some(TrackKind::Audio));
        assert_eq!(clip.display_name(), "Audio Clip");
    }

    #[test]
    fn negative_speed_is_rejected() {
        let mut clip = Clip::new("test");
        assert!(clip.set_speed(-1.0).is_err());
        assert!(clip.set_speed(0.0).is_ok());
        assert!(clip.set_speed(2.5).is_ok());
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut clip = Clip::new("test");
        assert!(clip.set_length_and_media_out(t(-1)).is_err());
    }

    #[test]
    fn out_trim_on_forward_clip_keeps_media_in() {
        let mut clip = clip_with(10, 5, 1.0, false);
        clip.set_length_and_media_out(t(6)).unwrap();
        assert_eq!(clip.length(), t(6));
        assert_eq!(clip.media_in(), t(5));
    }

    #[test]
    fn out_trim_on_reversed_clip_anchors_window_start() {
        let mut clip = clip_with(10, 5, 1.0, true);
        // Visible window is [5, 15); shortening to 6s from the out
        // point must keep the window start at 5 + (10 - 6) = 9.
        clip.set_length_and_media_out(t(6)).unwrap();
        assert_eq!(clip.length(), t(6));
        assert_eq!(clip.media_in(), t(9));
        assert_eq!(
            clip.mapper().visible_media_window(),
            TimeRange::new(t(9), t(15))
        );
    }

    #[test]
    fn in_trim_on_forward_clip_advances_media_in() {
        let mut clip = clip_with(10, 5, 1.0, false);
        clip.set_length_and_media_in(t(6)).unwrap();
        assert_eq!(clip.length(), t(6));
        assert_eq!(clip.media_in(), t(9));
        assert_eq!(
            clip.mapper().visible_media_window(),
            TimeRange::new(t(9), t(15))
        );
    }

    #[test]
    fn in_trim_on_reversed_clip_keeps_media_in() {
        let mut clip = clip_with(10, 5, 1.0, true);
        clip.set_length_and_media_in(t(6)).unwrap();
        assert_eq!(clip.length(), t(6));
        assert_eq!(clip.media_in(), t(5));
    }

    #[test]
    fn in_trim_delta_is_not_speed_scaled() {
        // ignore_speed: the trim delta is a sequence-time delta.
        let mut clip = clip_with(10, 5, 2.0, false);
        clip.set_length_and_media_in(t(6)).unwrap();
        assert_eq!(clip.media_in(), t(9));
    }

    #[test]
    fn trim_to_same_length_is_a_no_op() {
        let mut clip = clip_with(10, 5, 1.0, true);
        clip.set_length_and_media_out(t(10)).unwrap();
        assert_eq!(clip.media_in(), t(5));
    }

    #[test]
    fn params_serialize_round_trip() {
        let mut clip = clip_with(10, 5, 2.0, true);
        clip.set_maintain_audio_pitch(true);
        let json = serde_json::to_string(clip.params()).unwrap();
        let back: ClipParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.length, t(10));
        assert_eq!(back.media_in, t(5));
        assert!(back.reverse);
        assert!(back.maintain_audio_pitch);
        assert_eq!(back.speed, 2.0);
    }
}
