//! Error types for the lifecycle layer.

/// Errors surfaced by the session manager and the attachment reaper.
///
/// "Not authenticated" is not an error: an unknown, revoked or
/// expired token is reported as `Ok(None)` by
/// [`SessionManager::validate_and_touch`](crate::SessionManager::validate_and_touch)
/// so callers cannot tell those cases apart.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The backing store could not complete the call. Usually transient.
    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),

    /// A blocking store call was cancelled or panicked.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
