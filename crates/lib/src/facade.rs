//! Session facade: composes identity resolution, the history store, the
//! conversation engine, and the anchor index into the one surface the
//! presentation layer drives.
//!
//! All mutation of session state goes through these operations; the
//! presentation layer only reads snapshots and invokes them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::anchor::{AnchorIndex, ScrollTarget};
use crate::backend::{ApiClient, Backend};
use crate::config::Config;
use crate::engine::{self, SendOutcome};
use crate::history;
use crate::identity;
use crate::session::{Message, SessionPhase, SessionState, SharedState, GREETING};
use crate::storage::{self, StoredCredentials};

/// One chat session. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ChatSession {
    state: SharedState,
    backend: Arc<dyn Backend>,
    anchors: AnchorIndex,
    credentials_path: PathBuf,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, credentials_path: PathBuf) -> Self {
        Self {
            state: SessionState::shared(),
            backend,
            anchors: AnchorIndex::new(),
            credentials_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let backend = Arc::new(ApiClient::new(Some(config.backend.origin.clone())));
        Self {
            state: SessionState::shared(),
            backend,
            anchors: AnchorIndex::with_highlight(Duration::from_millis(config.chat.highlight_ms)),
            credentials_path: storage::default_credentials_path(),
        }
    }

    /// Run session startup: Idle → ResolvingIdentity → LoadingHistory →
    /// Ready, then auto-send a non-empty deep-link query exactly once.
    /// Calling `start` again after startup is a no-op until `logout` resets
    /// the session, so an incidental re-init cannot repeat the auto-send.
    pub async fn start(&self, initial_query: Option<&str>) {
        {
            let mut s = self.state.write().await;
            if s.phase != SessionPhase::Idle {
                return;
            }
            s.phase = SessionPhase::ResolvingIdentity;
        }

        let creds = StoredCredentials::load(&self.credentials_path).unwrap_or_default();
        let user_id = identity::resolve(&creds, self.backend.as_ref(), &self.credentials_path).await;

        {
            let mut s = self.state.write().await;
            s.user_id = user_id;
            s.phase = SessionPhase::LoadingHistory;
        }

        if let Some(uid) = user_id {
            history::load(&self.state, self.backend.as_ref(), uid).await;
        }

        {
            let mut s = self.state.write().await;
            // Guests skip the fetch but still get the greeting seed.
            if s.transcript.is_empty() && s.history_error.is_none() {
                let id = s.next_local_id();
                s.transcript.push(Message::assistant(id, GREETING));
            }
            s.phase = SessionPhase::Ready;
        }

        if let Some(q) = initial_query {
            let q = q.trim().to_string();
            if !q.is_empty() {
                let first = {
                    let mut s = self.state.write().await;
                    !std::mem::replace(&mut s.initial_query_sent, true)
                };
                if first {
                    self.send_message(Some(&q)).await;
                }
            }
        }
    }

    /// Send `text`, or drain the input buffer when `None`. On a successful
    /// authenticated exchange the history index is refreshed in the
    /// background; the refresh never blocks the next send.
    pub async fn send_message(&self, text: Option<&str>) -> SendOutcome {
        let text = match text {
            Some(t) => t.to_string(),
            None => self.state.read().await.input.clone(),
        };
        let outcome = engine::send_turn(&self.state, self.backend.as_ref(), &text).await;
        if let SendOutcome::Completed { remote_ok: true } = outcome {
            if let Some(uid) = self.state.read().await.user_id {
                let state = Arc::clone(&self.state);
                let backend = Arc::clone(&self.backend);
                tokio::spawn(async move {
                    history::refresh(&state, backend.as_ref(), uid).await;
                });
            }
        }
        outcome
    }

    /// Jump to a message picked from the history sidebar. None when the
    /// message is not currently rendered.
    pub async fn select_history_item(&self, id: &str) -> Option<ScrollTarget> {
        self.anchors.scroll_to(id).await
    }

    /// Re-run the history load after a failure.
    pub async fn retry_history_load(&self) {
        let user_id = self.state.read().await.user_id;
        if let Some(uid) = user_id {
            history::load(&self.state, self.backend.as_ref(), uid).await;
        }
    }

    /// Hard reset: clear stored credentials and return the session to
    /// new-session defaults. Not a partial mutation; the epoch bump in
    /// `reset` makes any still-in-flight remote completion stale.
    pub async fn logout(&self) {
        if let Err(e) = storage::clear_credentials(&self.credentials_path) {
            log::warn!("clearing stored credentials failed: {}", e);
        }
        self.anchors.clear().await;
        self.state.write().await.reset();
    }

    pub fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    // Read accessors for the presentation layer. Snapshots, not live views.

    pub async fn transcript(&self) -> Vec<Message> {
        self.state.read().await.transcript.clone()
    }

    pub async fn history_index(&self) -> Vec<Message> {
        self.state.read().await.history_index()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub async fn user_id(&self) -> Option<i64> {
        self.state.read().await.user_id
    }

    pub async fn is_assistant_typing(&self) -> bool {
        self.state.read().await.is_assistant_typing
    }

    pub async fn is_history_loading(&self) -> bool {
        self.state.read().await.is_history_loading
    }

    pub async fn history_error(&self) -> Option<String> {
        self.state.read().await.history_error.clone()
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.state.write().await.input = text.into();
    }

    pub async fn input(&self) -> String {
        self.state.read().await.input.clone()
    }
}
