use serde::{Deserialize, Serialize};

use crate::models::{ConnectionId, ConnectionStatus, ConnectionViewState, Direction, UserId};

/// Connection change notifications relayed over the in-process event bus.
///
/// Events are always phrased from the point of view of the subscriber they are
/// published to: `counterpart_user_id` is the *other* party, and `direction` is
/// the subscriber's side of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ConnectionEvent {
    /// The connection with `counterpart_user_id` now has this state
    Changed {
        counterpart_user_id: UserId,
        status: ConnectionStatus,
        direction: Direction,
        connection_id: Option<ConnectionId>,
        optimistic: bool,
    },

    /// The connection with `counterpart_user_id` no longer exists
    Removed {
        counterpart_user_id: UserId,
        connection_id: Option<ConnectionId>,
    },
}

impl ConnectionEvent {
    /// Builds the event that carries `state` for `counterpart`. An empty state
    /// becomes `Removed`.
    pub fn from_state(counterpart: UserId, state: &ConnectionViewState) -> Self {
        match (state.status, state.direction) {
            (Some(status), Some(direction)) => Self::Changed {
                counterpart_user_id: counterpart,
                status,
                direction,
                connection_id: state.connection_id.clone(),
                optimistic: state.is_optimistic,
            },
            _ => Self::Removed {
                counterpart_user_id: counterpart,
                connection_id: state.connection_id.clone(),
            },
        }
    }

    pub fn counterpart(&self) -> &UserId {
        match self {
            Self::Changed { counterpart_user_id, .. } => counterpart_user_id,
            Self::Removed { counterpart_user_id, .. } => counterpart_user_id,
        }
    }

    /// The view state a subscriber should adopt on receipt.
    pub fn view_state(&self) -> ConnectionViewState {
        match self {
            Self::Changed {
                status,
                direction,
                connection_id,
                optimistic,
                ..
            } => ConnectionViewState {
                status: Some(*status),
                direction: Some(*direction),
                connection_id: connection_id.clone(),
                is_optimistic: *optimistic,
            },
            Self::Removed { .. } => ConnectionViewState::empty(),
        }
    }
}
