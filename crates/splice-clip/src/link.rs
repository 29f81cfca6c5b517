//! Link group: the clips that move and trim together with this one.
//!
//! Link membership lives in the external node graph as a generic node
//! list. The group keeps only a derived, type-narrowed view of the
//! peers that are themselves clips, selected by capability check, and
//! recomputes it wholesale on every change notification. Link sets are
//! small; no incremental patching.

use smallvec::SmallVec;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// A node in the external graph that can be linked to a clip.
pub trait GraphNode: Send + Sync {
    /// Stable node identity.
    fn node_id(&self) -> Uuid;

    /// Capability check: whether this node is a timeline clip. Only
    /// clip peers appear in a [`LinkGroup`].
    fn is_clip(&self) -> bool {
        false
    }
}

/// Non-owning back-references to the linked peers that are clips.
#[derive(Default)]
pub struct LinkGroup {
    clips: SmallVec<[Weak<dyn GraphNode>; 2]>,
}

impl LinkGroup {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the clip view from the full link set. Called whenever
    /// link membership changes.
    pub fn link_change_event(&mut self, links: &[Arc<dyn GraphNode>]) {
        self.clips = links
            .iter()
            .filter(|node| node.is_clip())
            .map(Arc::downgrade)
            .collect();
    }

    /// The linked clips that are still alive.
    pub fn clip_links(&self) -> Vec<Arc<dyn GraphNode>> {
        self.clips.iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of stored clip references (including any that have since
    /// been dropped).
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// True when no clip peers are linked.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl std::fmt::Debug for LinkGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkGroup").field("len", &self.len()).finish()
    }
}
