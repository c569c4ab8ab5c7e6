//! The session lifecycle manager: issues bearer tokens and decides whether
//! they are still alive.
//!
//! ## Lifecycle
//!
//! ```text
//! issue() ──→ [Active] ──validate_and_touch()──→ [Active] (last_active_at = now)
//!                │                                  │
//!                │ revoke() / revoke_all()          │ idle > ttl
//!                ▼                                  ▼
//!            [Deleted] ◀──── sweep_once() ──── [Expired]
//! ```
//!
//! An expired token may still sit in the store until the next sweep. It is
//! never reported as valid: the liveness check is part of the conditional
//! touch and does not depend on the sweep having run.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::LifecycleError;
use crate::store::TokenStore;
use crate::sweep::{self, Sweep, SweepHandle};

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;

pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>, ttl: TimeDelta) -> Self {
        Self { store, clock, ttl }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Creates a session for `user_id` and returns the raw bearer token.
    ///
    /// Only the SHA-256 digest is stored, so this is the one time the
    /// plaintext exists outside the client.
    pub fn issue(&self, user_id: Uuid) -> Result<String, LifecycleError> {
        let token = generate_token();
        self.store
            .insert_token(&hash_token(&token), user_id, self.clock.now())?;

        debug!(%user_id, "session issued");
        Ok(token)
    }

    /// Resolves `token` to its owner and slides its expiry forward.
    ///
    /// Returns `Ok(None)` for unknown, revoked and expired tokens alike.
    /// Expired rows are left for the sweep.
    pub fn validate_and_touch(&self, token: &str) -> Result<Option<Uuid>, LifecycleError> {
        let now = self.clock.now();
        let user_id = self
            .store
            .touch_token(&hash_token(token), self.active_since(now), now)?;
        Ok(user_id)
    }

    /// Deletes one session. Revoking an unknown token is not an error.
    pub fn revoke(&self, token: &str) -> Result<(), LifecycleError> {
        if self.store.delete_token(&hash_token(token))? {
            debug!("session revoked");
        }
        Ok(())
    }

    /// Deletes every session owned by `user_id`. Returns how many were
    /// removed.
    pub fn revoke_all(&self, user_id: Uuid) -> Result<usize, LifecycleError> {
        let removed = self.store.delete_tokens_for_user(user_id)?;
        info!(%user_id, removed, "all sessions revoked");
        Ok(removed)
    }

    /// Physically removes every expired session.
    pub fn purge_expired(&self) -> Result<usize, LifecycleError> {
        let cutoff = self.active_since(self.clock.now());
        Ok(self.store.delete_tokens_idle_before(cutoff)?)
    }

    /// Starts the background purge on `interval`.
    pub fn start_sweep(self: &Arc<Self>, interval: Duration) -> SweepHandle {
        sweep::spawn(Arc::clone(self), interval)
    }

    /// Oldest `last_active_at` that still counts as alive at `now`.
    fn active_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.ttl
    }
}

impl Sweep for SessionManager {
    fn name(&self) -> &'static str {
        "session-tokens"
    }

    async fn sweep_once(&self) -> Result<usize, LifecycleError> {
        self.purge_expired()
    }
}

fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage key for a raw token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
