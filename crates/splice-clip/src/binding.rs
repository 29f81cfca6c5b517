//! Connected-source tracking and notification rebinding.
//!
//! A clip has exactly one upstream producer feeding its buffer input at
//! a time, plus (independently) whichever preview/marker provider
//! currently feeds the preview path. Every notification binding is an
//! owned [`Subscription`]; rebinding drops the old handle before
//! acquiring the new one, so there are never two live handles for the
//! same logical binding and a disconnect racing a reconnect cannot
//! leave a dangling subscription.

use crate::cache::{CacheKind, PlaybackCache};
use smallvec::SmallVec;
use splice_core::{ControlSender, Signal, Subscription, TimeRange};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Upstream producer collaborator: owns the four playback caches and
/// reports content changes in its own (media) time coordinate.
pub trait MediaSource: Send + Sync {
    /// Stable identity, used to detect producer changes on rebind.
    fn source_id(&self) -> Uuid;

    /// The cache instance for `kind`, if the source maintains one.
    fn cache(&self, kind: CacheKind) -> Option<Arc<dyn PlaybackCache>>;

    /// The preview/marker-capable node that currently feeds the preview
    /// path, discovered by the collaborator by walking its input graph.
    fn preview_provider(&self) -> Option<Arc<dyn PreviewProvider>>;

    /// Content-changed notification, in media time.
    fn invalidated(&self) -> &Signal<TimeRange>;
}

/// Downstream preview/marker provider collaborator.
pub trait PreviewProvider: Send + Sync {
    /// Stable identity, used for idempotent rebinding.
    fn provider_id(&self) -> Uuid;

    /// Emitted when the provider's markers change.
    fn markers_changed(&self) -> &Signal<()>;
}

/// Events marshaled from notification sources back to the clip's
/// control thread. Drained via [`Clip::pump_events`](crate::Clip::pump_events).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipEvent {
    /// The connected source invalidated a media-time range.
    SourceInvalidated(TimeRange),
    /// A cache finished recomputing a range.
    CacheValidated {
        /// Which of the four caches completed.
        kind: CacheKind,
        /// The range that became valid.
        range: TimeRange,
    },
    /// The preview provider's markers changed.
    MarkersChanged,
}

struct BoundSource {
    source: Arc<dyn MediaSource>,
    _invalidated: Subscription,
    _validated: SmallVec<[Subscription; 4]>,
}

struct BoundPreview {
    provider: Arc<dyn PreviewProvider>,
    _markers: Subscription,
}

/// Tracks the currently connected producer and preview provider and
/// keeps their notification subscriptions consistent.
pub struct ConnectedSourceBinding {
    events: ControlSender<ClipEvent>,
    source: Option<BoundSource>,
    preview: Option<BoundPreview>,
}

impl ConnectedSourceBinding {
    /// A binding with nothing connected. Notifications are forwarded
    /// through `events`.
    pub fn new(events: ControlSender<ClipEvent>) -> Self {
        Self {
            events,
            source: None,
            preview: None,
        }
    }

    /// Bind to a newly connected producer: subscribe its invalidation
    /// notification and the `Validated` notification of each of its
    /// caches. Any previous binding is dropped first.
    pub fn connect(&mut self, source: Arc<dyn MediaSource>) {
        self.disconnect();

        debug!(source = %source.source_id(), "binding connected source");

        let tx = self.events.clone();
        let invalidated = source
            .invalidated()
            .connect(move |range| tx.send(ClipEvent::SourceInvalidated(*range)));

        let mut validated = SmallVec::new();
        for kind in CacheKind::ALL {
            if let Some(cache) = source.cache(kind) {
                let tx = self.events.clone();
                validated.push(cache.validated().connect(move |event| {
                    tx.send(ClipEvent::CacheValidated {
                        kind,
                        range: event.range,
                    })
                }));
            }
        }

        self.source = Some(BoundSource {
            source,
            _invalidated: invalidated,
            _validated: validated,
        });
    }

    /// Unbind the producer, dropping every subscription acquired on
    /// connect. The preview binding is released too; without a source
    /// there is nothing feeding the preview path.
    pub fn disconnect(&mut self) {
        if let Some(bound) = self.source.take() {
            debug!(source = %bound.source.source_id(), "unbinding connected source");
        }
        self.preview = None;
    }

    /// The currently connected producer.
    pub fn source(&self) -> Option<&Arc<dyn MediaSource>> {
        self.source.as_ref().map(|b| &b.source)
    }

    /// Rebind the marker-change subscription to `provider`.
    /// Idempotent: rebinding to the already-bound provider is a no-op.
    pub fn bind_preview_provider(&mut self, provider: Option<Arc<dyn PreviewProvider>>) {
        match (&self.preview, &provider) {
            (Some(bound), Some(new)) if bound.provider.provider_id() == new.provider_id() => {
                return;
            }
            (None, None) => return,
            _ => {}
        }

        // Old handle must be gone before the new one exists.
        self.preview = None;

        if let Some(provider) = provider {
            debug!(provider = %provider.provider_id(), "binding preview provider");
            let tx = self.events.clone();
            let markers = provider
                .markers_changed()
                .connect(move |_| tx.send(ClipEvent::MarkersChanged));
            self.preview = Some(BoundPreview {
                provider,
                _markers: markers,
            });
        } else {
            debug!("clearing preview provider binding");
        }
    }

    /// The currently bound preview provider.
    pub fn preview_provider(&self) -> Option<&Arc<dyn PreviewProvider>> {
        self.preview.as_ref().map(|b| &b.provider)
    }
}

impl std::fmt::Debug for ConnectedSourceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedSourceBinding")
            .field("source", &self.source.as_ref().map(|b| b.source.source_id()))
            .field(
                "preview",
                &self.preview.as_ref().map(|b| b.provider.provider_id()),
            )
            .finish()
    }
}
