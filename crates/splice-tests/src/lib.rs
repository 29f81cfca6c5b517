//! Integration test crate for the Splice clip core.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on splice-core and splice-clip to verify they work
//! together.

#[cfg(test)]
mod clip;
