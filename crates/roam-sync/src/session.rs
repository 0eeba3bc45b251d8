use std::fmt;
use std::sync::{PoisonError, RwLock};

use roam_types::UserId;

/// An authenticated session: who the local user is and the bearer token the
/// REST API expects.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
}

impl Session {
    pub fn new(user_id: impl Into<UserId>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Source of the current session. `None` means the user is logged out.
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Option<Session>;
}

/// Session held in memory, swappable on login/logout.
#[derive(Default)]
pub struct SessionSlot {
    session: RwLock<Option<Session>>,
}

impl SessionSlot {
    pub fn new(session: Option<Session>) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set(&self, session: Session) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn clear(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl SessionProvider for SessionSlot {
    fn current(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
