//! Jump-to-message anchors.
//!
//! The renderer registers a handle per rendered message; the sidebar asks to
//! scroll to a message id. Unrendered ids are a no-op (the message may
//! belong to a conversation that is not loaded). A jump applies a transient
//! highlight that self-clears; repeated jumps to the same id restart the
//! highlight rather than stack it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::session::MessageId;

/// Default highlight duration after a jump.
pub const DEFAULT_HIGHLIGHT: Duration = Duration::from_secs(2);

/// Opaque renderer-assigned handle for a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorHandle(pub u64);

/// Where the presentation layer should smooth-scroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTarget {
    pub id: MessageId,
    pub handle: AnchorHandle,
}

struct AnchorInner {
    anchors: HashMap<MessageId, AnchorHandle>,
    highlighted: Option<MessageId>,
    /// Bumped per jump; the clear timer only clears its own epoch, so a
    /// newer jump restarts the highlight instead of being cut short.
    highlight_epoch: u64,
}

/// Cloneable map from message id to renderable handle, consulted on demand
/// by the presentation layer. Never mutates engine state.
#[derive(Clone)]
pub struct AnchorIndex {
    inner: Arc<RwLock<AnchorInner>>,
    highlight_for: Duration,
}

impl Default for AnchorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorIndex {
    pub fn new() -> Self {
        Self::with_highlight(DEFAULT_HIGHLIGHT)
    }

    pub fn with_highlight(highlight_for: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AnchorInner {
                anchors: HashMap::new(),
                highlighted: None,
                highlight_epoch: 0,
            })),
            highlight_for,
        }
    }

    /// Record (or replace) the handle for a rendered message.
    pub async fn register(&self, id: impl Into<MessageId>, handle: AnchorHandle) {
        self.inner.write().await.anchors.insert(id.into(), handle);
    }

    /// Drop the handle when a message unrenders.
    pub async fn unregister(&self, id: &str) {
        self.inner.write().await.anchors.remove(id);
    }

    /// Drop all anchors (session reset).
    pub async fn clear(&self) {
        let mut g = self.inner.write().await;
        g.anchors.clear();
        g.highlighted = None;
        g.highlight_epoch += 1;
    }

    /// Currently highlighted message, if any.
    pub async fn highlighted(&self) -> Option<MessageId> {
        self.inner.read().await.highlighted.clone()
    }

    /// Request a jump to `id`. Returns None when the message is not
    /// currently rendered. Starts (or restarts) the transient highlight.
    pub async fn scroll_to(&self, id: &str) -> Option<ScrollTarget> {
        let (target, epoch) = {
            let mut g = self.inner.write().await;
            let handle = *g.anchors.get(id)?;
            g.highlighted = Some(id.to_string());
            g.highlight_epoch += 1;
            (
                ScrollTarget {
                    id: id.to_string(),
                    handle,
                },
                g.highlight_epoch,
            )
        };
        let inner = Arc::clone(&self.inner);
        let after = self.highlight_for;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let mut g = inner.write().await;
            if g.highlight_epoch == epoch {
                g.highlighted = None;
            }
        });
        Some(target)
    }
}
