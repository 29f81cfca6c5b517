//! Splice Clip - Timeline clip core
//!
//! Models a single timeline clip and the machinery around it:
//! - Sequence-time ↔ media-time mapping (reverse, speed, offset)
//! - Cache invalidation and recompute orchestration over the four
//!   playback caches of the connected source
//! - Passthrough delegation between related clips' caches
//! - Link groups and connected-source notification rebinding

pub mod binding;
pub mod cache;
pub mod clip;
pub mod coordinator;
pub mod link;
pub mod mapper;
pub mod memory;

pub use binding::{ClipEvent, ConnectedSourceBinding, MediaSource, PreviewProvider};
pub use cache::{CacheKind, PassthroughCacheGraph, PlaybackCache, ValidatedEvent};
pub use clip::{Clip, ClipParams, TrackKind};
pub use coordinator::{CacheInvalidationCoordinator, CachePolicy};
pub use link::{GraphNode, LinkGroup};
pub use mapper::TimeMapper;
pub use memory::{MemoryCache, MemoryPreview, MemorySource};
