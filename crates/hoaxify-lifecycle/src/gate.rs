use std::sync::Arc;

use uuid::Uuid;

use crate::error::LifecycleError;
use crate::sessions::SessionManager;

/// Who is making a request, if anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    User(Uuid),
    Anonymous,
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::User(id) => Some(*id),
            Identity::Anonymous => None,
        }
    }
}

/// Turns an `Authorization` header into an [`Identity`].
///
/// The gate only answers "who". Ownership and account-state checks belong
/// to the handler.
#[derive(Clone)]
pub struct Gate {
    sessions: Arc<SessionManager>,
}

impl Gate {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// A missing or malformed header is `Anonymous`, never an error. Only a
    /// store failure while validating a well-formed token is.
    pub fn resolve(&self, header: Option<&str>) -> Result<Identity, LifecycleError> {
        let Some(token) = header.and_then(bearer_token) else {
            return Ok(Identity::Anonymous);
        };

        Ok(match self.sessions.validate_and_touch(token)? {
            Some(user_id) => Identity::User(user_id),
            None => Identity::Anonymous,
        })
    }
}

/// Extracts the token from a `Bearer <token>` header value. The scheme is
/// matched case-insensitively.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}
