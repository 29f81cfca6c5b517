//! Mapping between sequence time and media time.
//!
//! Sequence time is the coordinate on the timeline the clip sits on;
//! media time is the coordinate inside its source. The mapping applies,
//! in order: reverse mirroring, speed scaling, and the media-in offset.
//! The speed scale goes through a float multiply and back to rational,
//! so a small precision loss at non-unity speeds is accepted.
//!
//! Sentinel times are not values and pass through both directions
//! unchanged.

use crate::clip::ClipParams;
use splice_core::{RationalTime, TimeRange};

// Tolerances matching the float comparisons used for the speed input.
const SPEED_EPSILON: f64 = 1e-9;

fn speed_is_zero(speed: f64) -> bool {
    speed.abs() < SPEED_EPSILON
}

fn speed_is_unity(speed: f64) -> bool {
    (speed - 1.0).abs() < SPEED_EPSILON
}

/// Pure time-mapping functions over a snapshot of a clip's retime
/// parameters. Copy-cheap; build one per conversion via
/// [`Clip::mapper`](crate::clip::Clip::mapper) or directly for testing.
#[derive(Debug, Clone, Copy)]
pub struct TimeMapper {
    length: RationalTime,
    media_in: RationalTime,
    speed: f64,
    reverse: bool,
}

impl TimeMapper {
    /// Build a mapper from explicit parameters.
    pub fn new(length: RationalTime, media_in: RationalTime, speed: f64, reverse: bool) -> Self {
        Self {
            length,
            media_in,
            speed,
            reverse,
        }
    }

    /// Build a mapper from a clip's parameter set.
    pub fn from_params(params: &ClipParams) -> Self {
        Self::new(params.length, params.media_in, params.speed, params.reverse)
    }

    /// True when the clip is frozen on a single source frame
    /// (`speed == 0`). The inverse mapping is undefined in this state.
    pub fn is_frozen(&self) -> bool {
        speed_is_zero(self.speed)
    }

    /// Convert a sequence time to a media time.
    pub fn sequence_to_media_time(&self, t: RationalTime) -> RationalTime {
        self.sequence_to_media_time_with(t, false, false)
    }

    /// Convert a sequence time to a media time, optionally skipping the
    /// reverse mirror or the speed scale (used by trim adjustments,
    /// where the delta is still an unscaled sequence-time delta).
    pub fn sequence_to_media_time_with(
        &self,
        t: RationalTime,
        ignore_reverse: bool,
        ignore_speed: bool,
    ) -> RationalTime {
        // Sentinels are not values; they pass through untouched.
        if t.is_sentinel() {
            return t;
        }

        let mut media_time = t;

        if self.reverse && !ignore_reverse {
            media_time = self.length - media_time;
        }

        if !ignore_speed {
            if speed_is_zero(self.speed) {
                // Effectively holds the frame at the in point
                media_time = RationalTime::ZERO;
            } else if !speed_is_unity(self.speed) {
                media_time =
                    RationalTime::from_seconds_f64(media_time.to_seconds_f64() * self.speed);
            }
        }

        media_time + self.media_in
    }

    /// Convert a media time to a sequence time. At `speed == 0` the
    /// inverse is undefined and the result is
    /// [`RationalTime::INDEFINITE`].
    pub fn media_to_sequence_time(&self, t: RationalTime) -> RationalTime {
        if t.is_sentinel() {
            return t;
        }

        let mut sequence_time = t - self.media_in;

        if speed_is_zero(self.speed) {
            sequence_time = RationalTime::INDEFINITE;
        } else if !speed_is_unity(self.speed) {
            sequence_time =
                RationalTime::from_seconds_f64(sequence_time.to_seconds_f64() / self.speed);
        }

        if self.reverse {
            // An indefinite value absorbs the mirror.
            sequence_time = self.length - sequence_time;
        }

        sequence_time
    }

    /// Express a sequence-time range in media time (both endpoints
    /// through the forward mapping; a reversed clip swaps them, so the
    /// result is normalized).
    pub fn input_time_adjustment(&self, range: TimeRange) -> TimeRange {
        TimeRange::spanning(
            self.sequence_to_media_time(range.start),
            self.sequence_to_media_time(range.end),
        )
    }

    /// Express a media-time range in sequence time (endpoint-wise
    /// inverse mapping, normalized).
    pub fn output_time_adjustment(&self, range: TimeRange) -> TimeRange {
        TimeRange::spanning(
            self.media_to_sequence_time(range.start),
            self.media_to_sequence_time(range.end),
        )
    }

    /// The portion of the source this clip actually uses: the clip span
    /// `[0, length)` expressed in media time.
    pub fn visible_media_window(&self) -> TimeRange {
        self.input_time_adjustment(TimeRange::new(RationalTime::ZERO, self.length))
    }
}
