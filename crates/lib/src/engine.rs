//! Conversation engine: one turn = optimistic local append, then the remote
//! assistant call, then reconciliation.
//!
//! The optimistic user message is never rolled back; a failed remote call is
//! answered in-band with a synthetic assistant reply, and the typing flag is
//! cleared on every path so the UI is never stuck on a pending indicator.

use crate::backend::Backend;
use crate::session::{Message, SharedState};

/// Shown in place of an assistant reply when the backend cannot be reached
/// or answers with an error.
pub const CONNECT_FAILURE_REPLY: &str =
    "I'm having trouble connecting to the server right now. \
     Please check that the backend is running and try again.";

/// What happened to a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Turn ran to completion; `remote_ok` is false when the transcript got
    /// the synthetic connectivity reply instead of a real one.
    Completed { remote_ok: bool },
    /// Text was empty after trimming; nothing appended.
    RejectedEmpty,
    /// An assistant call is already in flight (at most one at a time).
    RejectedBusy,
    /// The session was hard-reset while the call was in flight; the reply
    /// was discarded and the fresh state left untouched.
    Superseded,
}

/// Run one conversation turn. The append of the user message, the input
/// clear, and the typing flag are one critical section, so a concurrent
/// send observes the busy state and is rejected.
pub async fn send_turn(state: &SharedState, backend: &dyn Backend, text: &str) -> SendOutcome {
    let text = text.trim();
    if text.is_empty() {
        return SendOutcome::RejectedEmpty;
    }

    let (user_id, epoch) = {
        let mut s = state.write().await;
        if s.is_assistant_typing {
            return SendOutcome::RejectedBusy;
        }
        let id = s.next_local_id();
        s.transcript.push(Message::user(id, text));
        s.input.clear();
        s.is_assistant_typing = true;
        (s.user_id, s.session_epoch)
    };

    let result = backend.ask(text, user_id).await;

    let mut s = state.write().await;
    if s.session_epoch != epoch {
        // A hard reset happened mid-flight; the fresh state already has
        // typing cleared and must not receive this reply.
        log::debug!("assistant reply arrived after session reset, dropping");
        return SendOutcome::Superseded;
    }
    let (reply, remote_ok) = match result {
        Ok(res) => (res.response, true),
        Err(e) => {
            log::warn!("assistant call failed: {}", e);
            (CONNECT_FAILURE_REPLY.to_string(), false)
        }
    };
    let id = s.next_local_id();
    s.transcript.push(Message::assistant(id, reply));
    // Final step on every path: the UI must never be left "typing".
    s.is_assistant_typing = false;
    SendOutcome::Completed { remote_ok }
}
