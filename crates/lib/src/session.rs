//! Message and session-state types for the chat session.
//!
//! The transcript is an append-only ordered list of messages owned by the
//! conversation engine. The history index is a bounded projection of
//! persisted user messages, used as conversation-starter shortcuts in the
//! sidebar.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Unique message identifier (opaque string; backend-issued for persisted
/// history, locally generated for messages created this session).
pub type MessageId = String;

/// Greeting seeded into an otherwise empty transcript after startup.
pub const GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Cap on the derived conversation-starter index.
pub const HISTORY_INDEX_CAP: usize = 15;

/// Who authored a message. Matches the literal strings the history service
/// uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One chat message. Immutable once created; transcripts are replaced
/// wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
}

impl Message {
    pub fn user(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::User,
        }
    }

    pub fn assistant(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::Assistant,
        }
    }
}

/// Startup sequence of a session. Re-entered only via `logout`, never on
/// incidental value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    ResolvingIdentity,
    LoadingHistory,
    Ready,
}

/// The single mutable aggregate for one chat session. Only the facade's
/// operations mutate it; the presentation layer reads snapshots.
#[derive(Debug)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Resolved at most once per session; cleared only by logout.
    pub user_id: Option<i64>,
    /// Live transcript, chronological.
    pub transcript: Vec<Message>,
    /// Persisted history as last fetched, chronological. Source of the
    /// history index; never the live transcript after seeding.
    pub history: Vec<Message>,
    pub is_history_loading: bool,
    pub history_error: Option<String>,
    /// True while exactly one assistant call is in flight.
    pub is_assistant_typing: bool,
    /// Draft input; drained by `send_message` when no text is given.
    pub input: String,
    /// Guards the deep-link auto-send so it fires at most once.
    pub initial_query_sent: bool,
    /// Bumped per history fetch; a completing fetch applies only when still
    /// current (last write wins).
    pub history_generation: u64,
    /// Bumped by every hard reset. Remote completions started under an
    /// older epoch are stale and must not write into the new session.
    pub session_epoch: u64,
    local_seq: u64,
}

/// Shared handle to the session state; mutation happens under short write
/// locks so no two mutations interleave within one event.
pub type SharedState = Arc<RwLock<SessionState>>;

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            user_id: None,
            transcript: Vec::new(),
            history: Vec::new(),
            is_history_loading: false,
            history_error: None,
            is_assistant_typing: false,
            input: String::new(),
            initial_query_sent: false,
            history_generation: 0,
            session_epoch: 0,
            local_seq: 0,
        }
    }

    /// Return to new-session defaults. Bumps the session epoch so any
    /// in-flight remote completion from before the reset is recognized as
    /// stale and dropped instead of mutating the fresh state.
    pub fn reset(&mut self) {
        let epoch = self.session_epoch + 1;
        *self = Self::new();
        self.session_epoch = epoch;
    }

    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Next locally generated message id: time-based plus a monotonic
    /// counter, so ids stay unique even within one millisecond.
    pub fn next_local_id(&mut self) -> MessageId {
        self.local_seq += 1;
        format!(
            "local-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            self.local_seq
        )
    }

    /// Most-recent-first persisted user utterances, capped. Recomputed from
    /// the persisted history on every read.
    pub fn history_index(&self) -> Vec<Message> {
        self.history
            .iter()
            .rev()
            .filter(|m| m.sender == Sender::User)
            .take(HISTORY_INDEX_CAP)
            .cloned()
            .collect()
    }
}
