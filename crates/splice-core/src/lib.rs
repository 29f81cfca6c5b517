//! Splice Core - Foundation types for the clip engine
//!
//! This crate provides the fundamental types used throughout Splice:
//! - Time representation (RationalTime with sentinels, TimeRange, TimeRangeSet)
//! - Notification primitives (Signal, Subscription, ControlQueue)
//! - Error types

pub mod error;
pub mod signal;
pub mod time;

pub use error::{Result, SpliceError};
pub use signal::{ControlQueue, ControlSender, Signal, Subscription};
pub use time::{RationalTime, TimeRange, TimeRangeSet};
