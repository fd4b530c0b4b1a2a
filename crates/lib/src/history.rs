//! Persisted-history fetch and reconciliation.
//!
//! `load` seeds the transcript once at session start; `refresh` keeps the
//! conversation-starter index current after message exchanges without ever
//! touching the live transcript. A completing fetch applies only while it
//! still corresponds to the current identity and generation (last write
//! wins; superseded results are dropped, not cancelled).

use crate::backend::{ApiError, Backend, HistoryRecord};
use crate::session::{Message, SharedState, GREETING};

fn record_to_message(r: HistoryRecord) -> Message {
    Message {
        id: r.id.to_string(),
        text: r.message,
        sender: r.sender,
    }
}

/// User-facing cause for a failed history fetch. Distinguishes a server
/// error payload from an unreachable server; the user must be told their
/// history may be missing.
fn load_error_message(e: &ApiError) -> String {
    if e.is_server_error() {
        format!("The server reported an error while loading your history ({}).", e)
    } else {
        "Could not reach the server while loading your history.".to_string()
    }
}

/// Fetch all persisted messages for `user_id` and seed the transcript if it
/// is still empty. No-op while another load is already in flight.
pub async fn load(state: &SharedState, backend: &dyn Backend, user_id: i64) {
    let (generation, epoch) = {
        let mut s = state.write().await;
        if s.is_history_loading {
            return;
        }
        s.is_history_loading = true;
        s.history_error = None;
        s.history_generation += 1;
        (s.history_generation, s.session_epoch)
    };

    let result = backend.fetch_history(user_id).await;

    let mut s = state.write().await;
    if s.session_epoch != epoch {
        // A hard reset happened; the loading flag now belongs to whatever
        // load the new session may have started.
        log::debug!("history load outlived the session, dropping result");
        return;
    }
    // Within one epoch only one load runs at a time, so this attempt owns
    // the flag even when a refresh has since bumped the generation.
    s.is_history_loading = false;
    if s.history_generation != generation || s.user_id != Some(user_id) {
        log::debug!("history load superseded, dropping result");
        return;
    }
    match result {
        Ok(records) => {
            let messages: Vec<Message> = records.into_iter().map(record_to_message).collect();
            s.history = messages.clone();
            if s.transcript.is_empty() {
                // Seed only an untouched transcript; a conversation started
                // before history arrived is never clobbered.
                s.transcript = messages;
            }
            if s.transcript.is_empty() {
                let id = s.next_local_id();
                s.transcript.push(Message::assistant(id, GREETING));
            }
        }
        Err(e) => {
            log::warn!("history load failed: {}", e);
            s.history_error = Some(load_error_message(&e));
        }
    }
}

/// Re-fetch persisted history for the index only. Fire-and-forget; failures
/// are logged, not surfaced, and the live transcript is never touched.
pub async fn refresh(state: &SharedState, backend: &dyn Backend, user_id: i64) {
    let (generation, epoch) = {
        let mut s = state.write().await;
        s.history_generation += 1;
        (s.history_generation, s.session_epoch)
    };

    match backend.fetch_history(user_id).await {
        Ok(records) => {
            let mut s = state.write().await;
            if s.session_epoch != epoch
                || s.history_generation != generation
                || s.user_id != Some(user_id)
            {
                log::debug!("history refresh superseded, dropping result");
                return;
            }
            s.history = records.into_iter().map(record_to_message).collect();
        }
        Err(e) => {
            log::debug!("history refresh failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{record, FakeBackend};
    use crate::session::{Sender, SessionState};

    fn state_for(user_id: i64) -> SharedState {
        let state = SessionState::shared();
        {
            let mut s = state.try_write().expect("fresh state");
            s.user_id = Some(user_id);
        }
        state
    }

    #[tokio::test]
    async fn empty_history_seeds_single_greeting() {
        let state = state_for(7);
        let backend = FakeBackend::new();
        load(&state, &backend, 7).await;
        let s = state.read().await;
        assert_eq!(s.transcript.len(), 1);
        assert_eq!(s.transcript[0].sender, Sender::Assistant);
        assert_eq!(s.transcript[0].text, GREETING);
        assert!(s.history_error.is_none());
        assert!(!s.is_history_loading);
    }

    #[tokio::test]
    async fn records_seed_transcript_and_index() {
        let state = state_for(7);
        let backend = FakeBackend::new();
        *backend.history.lock().unwrap() = Ok(vec![
            record(1, "first question", Sender::User),
            record(2, "first answer", Sender::Assistant),
            record(3, "second question", Sender::User),
        ]);
        load(&state, &backend, 7).await;
        let s = state.read().await;
        assert_eq!(s.transcript.len(), 3);
        assert_eq!(s.transcript[0].id, "1");
        let index = s.history_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index[0].text, "second question");
    }

    #[tokio::test]
    async fn load_never_clobbers_started_conversation() {
        let state = state_for(7);
        {
            let mut s = state.write().await;
            let id = s.next_local_id();
            s.transcript.push(Message::user(id, "already typing"));
        }
        let backend = FakeBackend::new();
        *backend.history.lock().unwrap() = Ok(vec![record(1, "old", Sender::User)]);
        load(&state, &backend, 7).await;
        let s = state.read().await;
        assert_eq!(s.transcript.len(), 1);
        assert_eq!(s.transcript[0].text, "already typing");
        // The index still picks up the persisted history.
        assert_eq!(s.history_index().len(), 1);
    }

    #[tokio::test]
    async fn server_error_sets_retryable_error_state() {
        let state = state_for(7);
        let backend = FakeBackend::new();
        *backend.history.lock().unwrap() = Err("500 Internal Server Error".to_string());
        load(&state, &backend, 7).await;
        let s = state.read().await;
        let err = s.history_error.as_deref().expect("error surfaced");
        assert!(!err.is_empty());
        assert!(!s.is_history_loading);
        assert!(s.transcript.is_empty());
    }

    #[tokio::test]
    async fn retry_after_failure_clears_error() {
        let state = state_for(7);
        let backend = FakeBackend::new();
        *backend.history.lock().unwrap() = Err("500 boom".to_string());
        load(&state, &backend, 7).await;
        assert!(state.read().await.history_error.is_some());

        *backend.history.lock().unwrap() = Ok(Vec::new());
        load(&state, &backend, 7).await;
        let s = state.read().await;
        assert!(s.history_error.is_none());
        assert_eq!(s.transcript.len(), 1);
    }

    #[tokio::test]
    async fn refresh_updates_index_but_not_transcript() {
        let state = state_for(7);
        {
            let mut s = state.write().await;
            let id = s.next_local_id();
            s.transcript.push(Message::user(id, "live"));
        }
        let backend = FakeBackend::new();
        *backend.history.lock().unwrap() = Ok(vec![record(9, "persisted", Sender::User)]);
        refresh(&state, &backend, 7).await;
        let s = state.read().await;
        assert_eq!(s.transcript.len(), 1);
        assert_eq!(s.history_index().len(), 1);
        assert_eq!(s.history_index()[0].id, "9");
    }

    #[tokio::test]
    async fn load_outliving_reset_leaves_new_sessions_flag_alone() {
        use std::sync::Arc;
        use std::time::Duration;

        let state = state_for(7);
        let backend = Arc::new(FakeBackend::new());
        *backend.history.lock().unwrap() = Ok(vec![record(1, "stale", Sender::User)]);
        *backend.history_delay.lock().unwrap() = Duration::from_millis(150);

        let task = {
            let state = Arc::clone(&state);
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { load(&state, backend.as_ref(), 7).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.read().await.is_history_loading);
        {
            // Hard reset, then the new session logs back in and starts its
            // own load, which owns the flag now.
            let mut s = state.write().await;
            s.reset();
            s.user_id = Some(7);
            s.is_history_loading = true;
        }

        task.await.expect("join");
        let s = state.read().await;
        assert!(s.is_history_loading);
        assert!(s.history.is_empty());
        assert!(s.transcript.is_empty());
    }

    #[tokio::test]
    async fn refresh_outliving_reset_is_dropped() {
        use std::sync::Arc;
        use std::time::Duration;

        let state = state_for(7);
        let backend = Arc::new(FakeBackend::new());
        *backend.history.lock().unwrap() = Ok(vec![record(1, "stale", Sender::User)]);
        *backend.history_delay.lock().unwrap() = Duration::from_millis(150);

        let task = {
            let state = Arc::clone(&state);
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { refresh(&state, backend.as_ref(), 7).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let mut s = state.write().await;
            s.reset();
            s.user_id = Some(7);
        }

        task.await.expect("join");
        assert!(state.read().await.history.is_empty());
    }

    #[tokio::test]
    async fn stale_result_for_old_identity_is_dropped() {
        let state = state_for(7);
        let backend = FakeBackend::new();
        *backend.history.lock().unwrap() = Ok(vec![record(1, "stale", Sender::User)]);
        // Identity changes while the fetch would be in flight; simulate by
        // swapping the user after priming, then loading for the old id.
        {
            let mut s = state.write().await;
            s.user_id = Some(8);
        }
        load(&state, &backend, 7).await;
        let s = state.read().await;
        assert!(s.history.is_empty());
        assert!(s.transcript.is_empty());
    }
}
