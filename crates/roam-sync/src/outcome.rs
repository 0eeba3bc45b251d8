use roam_types::{ConnectionId, ConnectionStatus, ConnectionViewState};

/// What a surface should show the user after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoginPrompt,
    UpgradePrompt(String),
    Info(String),
    Error(String),
}

/// Result of a coordinator action. Every failure is folded into one of
/// these; nothing propagates to the rendering layer as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// No session; nothing was attempted.
    LoginRequired,
    /// Tried to act on one's own id; nothing was attempted.
    SelfConnection,
    /// A pending or accepted connection already exists; nothing was attempted.
    AlreadyActive(ConnectionStatus),
    /// Precondition missing (no connection id) or another action on the same
    /// view is still in flight.
    Ignored,
    /// Request created and confirmed.
    Sent(ConnectionId),
    /// Response recorded and confirmed.
    Responded(ConnectionStatus),
    /// Connection deleted and confirmed.
    Removed,
    /// The server reported a conflict; local state was re-fetched.
    Reconciled(ConnectionViewState),
    /// Plan limit reached; the action was rolled back.
    UpgradeRequired(String),
    /// Any other failure; the action was rolled back.
    Failed(String),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent(_) | Self::Responded(_) | Self::Removed)
    }

    pub fn notice(&self) -> Option<Notice> {
        let notice = match self {
            Self::LoginRequired => Notice::LoginPrompt,
            Self::SelfConnection => Notice::Error("You cannot connect with yourself".into()),
            Self::AlreadyActive(ConnectionStatus::Accepted) => {
                Notice::Info("You are already connected".into())
            }
            Self::AlreadyActive(_) => Notice::Info("Connection request already pending".into()),
            Self::Ignored => return None,
            Self::Sent(_) => Notice::Info("Connection request sent".into()),
            Self::Responded(ConnectionStatus::Accepted) => {
                Notice::Info("Connection request accepted".into())
            }
            Self::Responded(_) => Notice::Info("Connection request declined".into()),
            Self::Removed => Notice::Info("Connection removed".into()),
            Self::Reconciled(_) => Notice::Info("Connection already exists".into()),
            Self::UpgradeRequired(message) => Notice::UpgradePrompt(message.clone()),
            Self::Failed(message) => Notice::Error(message.clone()),
        };
        Some(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices() {
        assert_eq!(ActionOutcome::LoginRequired.notice(), Some(Notice::LoginPrompt));
        assert_eq!(ActionOutcome::Ignored.notice(), None);
        assert!(matches!(
            ActionOutcome::UpgradeRequired("limit".into()).notice(),
            Some(Notice::UpgradePrompt(m)) if m == "limit"
        ));
        assert!(ActionOutcome::Sent("c1".into()).is_success());
        assert!(!ActionOutcome::Reconciled(ConnectionViewState::empty()).is_success());
    }
}
