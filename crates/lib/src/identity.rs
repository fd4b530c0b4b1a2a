//! Identity resolution.
//!
//! A cached user id short-circuits (at most one profile call per session);
//! otherwise the stored token is exchanged for a profile and the id is
//! persisted for future sessions. Any failure degrades to guest mode and
//! never aborts startup.

use std::path::Path;

use crate::backend::Backend;
use crate::storage::StoredCredentials;

/// Resolve the authenticated user id, if any. `None` means guest mode: no
/// history, no persistence of new messages.
pub async fn resolve(
    creds: &StoredCredentials,
    backend: &dyn Backend,
    credentials_path: &Path,
) -> Option<i64> {
    if let Some(id) = creds.user_id {
        return Some(id);
    }
    let token = creds.access_token.as_deref()?;
    match backend.fetch_profile(token).await {
        Ok(profile) => {
            let updated = StoredCredentials {
                access_token: creds.access_token.clone(),
                user_id: Some(profile.id),
            };
            if let Err(e) = updated.save(credentials_path) {
                log::warn!("persisting resolved user id failed: {}", e);
            }
            Some(profile.id)
        }
        Err(e) => {
            log::warn!("identity resolution failed, continuing as guest: {}", e);
            None
        }
    }
}
