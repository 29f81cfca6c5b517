//! Time representation for frame-accurate editing
//!
//! Uses rational numbers to avoid floating-point accumulation errors.
//! In addition to finite values, a time can carry one of three reserved
//! sentinels: unbounded-min, unbounded-max (a span extending to infinity
//! in either direction) and indefinite (no defined value, e.g. the
//! inverse of a zero-speed retime). Sentinels are detected by equality
//! against the named constants and are inert under arithmetic.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum TimeRepr {
    Finite(Rational64),
    UnboundedMin,
    UnboundedMax,
    Indefinite,
}

/// A rational time value representing a point in time.
/// Uses rational arithmetic to maintain frame-accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    repr: TimeRepr,
}

impl RationalTime {
    /// Create a new RationalTime from numerator and denominator.
    /// The time is `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            repr: TimeRepr::Finite(Rational64::new(numerator, denominator)),
        }
    }

    /// Create a RationalTime from seconds as a float.
    /// Note: May introduce small precision errors. Non-finite floats map
    /// to [`RationalTime::INDEFINITE`].
    pub fn from_seconds_f64(seconds: f64) -> Self {
        if !seconds.is_finite() {
            return Self::INDEFINITE;
        }
        // Use a high denominator for reasonable precision
        const PRECISION: i64 = 1_000_000;
        Self {
            repr: TimeRepr::Finite(Rational64::new(
                (seconds * PRECISION as f64).round() as i64,
                PRECISION,
            )),
        }
    }

    /// Convert to seconds as f64. Sentinels map to the matching float
    /// special values (±infinity, NaN).
    pub fn to_seconds_f64(self) -> f64 {
        match self.repr {
            TimeRepr::Finite(v) => *v.numer() as f64 / *v.denom() as f64,
            TimeRepr::UnboundedMin => f64::NEG_INFINITY,
            TimeRepr::UnboundedMax => f64::INFINITY,
            TimeRepr::Indefinite => f64::NAN,
        }
    }

    /// Zero time constant.
    pub const ZERO: Self = Self {
        repr: TimeRepr::Finite(Rational64::new_raw(0, 1)),
    };

    /// Sentinel: extends infinitely toward negative time.
    pub const UNBOUNDED_MIN: Self = Self {
        repr: TimeRepr::UnboundedMin,
    };

    /// Sentinel: extends infinitely toward positive time.
    pub const UNBOUNDED_MAX: Self = Self {
        repr: TimeRepr::UnboundedMax,
    };

    /// Sentinel: no defined value (the rational analogue of NaN).
    pub const INDEFINITE: Self = Self {
        repr: TimeRepr::Indefinite,
    };

    /// True for finite (non-sentinel) values.
    #[inline]
    pub fn is_finite(self) -> bool {
        matches!(self.repr, TimeRepr::Finite(_))
    }

    /// True for any of the three reserved sentinel values.
    #[inline]
    pub fn is_sentinel(self) -> bool {
        !self.is_finite()
    }

    /// True for the indefinite (NaN-like) sentinel.
    #[inline]
    pub fn is_indefinite(self) -> bool {
        matches!(self.repr, TimeRepr::Indefinite)
    }

    /// Check if this time is finite zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        matches!(self.repr, TimeRepr::Finite(v) if *v.numer() == 0)
    }

    /// The smaller of two times. Returns `self` when the pair is
    /// incomparable (either side indefinite).
    pub fn min(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            _ => self,
        }
    }

    /// The larger of two times. Returns `self` when the pair is
    /// incomparable (either side indefinite).
    pub fn max(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            _ => self,
        }
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use TimeRepr::*;
        match (self.repr, other.repr) {
            (Indefinite, _) | (_, Indefinite) => None,
            (Finite(a), Finite(b)) => Some(a.cmp(&b)),
            (UnboundedMin, UnboundedMin) => Some(Ordering::Equal),
            (UnboundedMax, UnboundedMax) => Some(Ordering::Equal),
            (UnboundedMin, _) => Some(Ordering::Less),
            (_, UnboundedMin) => Some(Ordering::Greater),
            (UnboundedMax, _) => Some(Ordering::Greater),
            (_, UnboundedMax) => Some(Ordering::Less),
        }
    }
}

// Sentinels absorb arithmetic: a sentinel operand passes through
// unchanged (left operand wins when both are sentinels).
impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        match (self.repr, rhs.repr) {
            (TimeRepr::Finite(a), TimeRepr::Finite(b)) => Self {
                repr: TimeRepr::Finite(a + b),
            },
            (TimeRepr::Finite(_), _) => rhs,
            _ => self,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        match (self.repr, rhs.repr) {
            (TimeRepr::Finite(a), TimeRepr::Finite(b)) => Self {
                repr: TimeRepr::Finite(a - b),
            },
            (TimeRepr::Finite(_), _) => rhs,
            _ => self,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            TimeRepr::Finite(_) => write!(f, "{:.3}s", self.to_seconds_f64()),
            TimeRepr::UnboundedMin => write!(f, "-unbounded"),
            TimeRepr::UnboundedMax => write!(f, "+unbounded"),
            TimeRepr::Indefinite => write!(f, "indefinite"),
        }
    }
}

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub start: RationalTime,
    /// End time (exclusive)
    pub end: RationalTime,
}

impl TimeRange {
    /// Create a new time range from start and end times.
    #[inline]
    pub fn new(start: RationalTime, end: RationalTime) -> Self {
        Self { start, end }
    }

    /// Create a range spanning two times in either order.
    #[inline]
    pub fn spanning(a: RationalTime, b: RationalTime) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Create a time range from start and duration.
    #[inline]
    pub fn from_start_duration(start: RationalTime, duration: RationalTime) -> Self {
        Self {
            start,
            end: start + duration,
        }
    }

    /// Duration of the range. Meaningful only for finite endpoints.
    #[inline]
    pub fn duration(self) -> RationalTime {
        self.end - self.start
    }

    /// A range is empty when it contains no time at all. Ranges with an
    /// indefinite endpoint are treated as empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        !(self.start < self.end)
    }

    /// Check if a time is within this range.
    #[inline]
    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end
    }

    /// Check if `other` lies entirely within this range.
    pub fn contains_range(self, other: Self) -> bool {
        other.is_empty() || (other.start >= self.start && other.end <= self.end)
    }

    /// Check if two ranges overlap.
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Compute the intersection of two ranges, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Subtract `other`, yielding the zero, one, or two pieces left over.
    pub fn subtract(self, other: Self) -> SmallVec<[Self; 2]> {
        let mut out = SmallVec::new();
        if self.is_empty() {
            return out;
        }
        if !self.overlaps(other) {
            out.push(self);
            return out;
        }
        if self.start < other.start {
            out.push(Self::new(self.start, other.start));
        }
        if self.end > other.end {
            out.push(Self::new(other.end, self.end));
        }
        out
    }

    /// Empty range starting at zero.
    pub const EMPTY: Self = Self {
        start: RationalTime::ZERO,
        end: RationalTime::ZERO,
    };

    /// The whole of time, unbounded in both directions.
    pub const EVERYTHING: Self = Self {
        start: RationalTime::UNBOUNDED_MIN,
        end: RationalTime::UNBOUNDED_MAX,
    };
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// An ordered set of disjoint, non-empty time ranges.
///
/// Adjacent and overlapping ranges are coalesced on insert; removal
/// splits ranges where necessary. Backs the invalidation ledger and
/// passthrough subtraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeSet {
    ranges: Vec<TimeRange>,
}

impl TimeRangeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of disjoint ranges in the set.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True when the set contains no time.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The disjoint ranges, sorted by start time.
    pub fn as_slice(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Iterate over the disjoint ranges in order.
    pub fn iter(&self) -> impl Iterator<Item = &TimeRange> {
        self.ranges.iter()
    }

    /// Insert a range, coalescing with any overlapping or touching
    /// entries. Empty ranges are ignored.
    pub fn insert(&mut self, range: TimeRange) {
        if range.is_empty() {
            return;
        }
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut merged = range;
        let mut placed = false;
        for &r in &self.ranges {
            if r.end < merged.start {
                out.push(r);
            } else if r.start > merged.end {
                if !placed {
                    out.push(merged);
                    placed = true;
                }
                out.push(r);
            } else {
                merged = TimeRange::new(merged.start.min(r.start), merged.end.max(r.end));
            }
        }
        if !placed {
            out.push(merged);
        }
        self.ranges = out;
    }

    /// Remove a range, splitting any entries that straddle it.
    pub fn remove(&mut self, range: TimeRange) {
        if range.is_empty() {
            return;
        }
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        for &r in &self.ranges {
            for piece in r.subtract(range) {
                if !piece.is_empty() {
                    out.push(piece);
                }
            }
        }
        self.ranges = out;
    }

    /// Remove every range in `others`.
    pub fn remove_all<'a>(&mut self, others: impl IntoIterator<Item = &'a TimeRange>) {
        for r in others {
            self.remove(*r);
        }
    }

    /// The portions of the set that fall inside `window`.
    pub fn ranges_within(&self, window: TimeRange) -> Vec<TimeRange> {
        self.ranges
            .iter()
            .filter_map(|r| r.intersection(window))
            .collect()
    }

    /// True when `range` is entirely covered by a single entry.
    pub fn covers(&self, range: TimeRange) -> bool {
        if range.is_empty() {
            return true;
        }
        self.ranges
            .iter()
            .any(|r| r.start <= range.start && r.end >= range.end)
    }
}

impl FromIterator<TimeRange> for TimeRangeSet {
    fn from_iter<I: IntoIterator<Item = TimeRange>>(iter: I) -> Self {
        let mut set = Self::new();
        for r in iter {
            set.insert(r);
        }
        set
    }
}
