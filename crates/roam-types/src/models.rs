use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a user, as issued by the REST backend.
    UserId
);

opaque_id!(
    /// Identifier of a connection record. Only the remote store assigns these.
    ConnectionId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    /// Pending and accepted records count towards the one-per-pair limit.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    /// Case-insensitive parse; the backend is not consistent about casing.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "ACCEPTED" => Some(Self::Accepted),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the request the local user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    /// The same relationship seen from the other party.
    pub fn flip(self) -> Self {
        match self {
            Self::Sent => Self::Received,
            Self::Received => Self::Sent,
        }
    }
}

/// Canonical user shape after normalization of API payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub is_premium: bool,
}

/// A connection as held by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: ConnectionStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Populated sender profile, when the endpoint joins user data.
    pub sender: Option<UserSummary>,
    pub receiver: Option<UserSummary>,
}

impl ConnectionRecord {
    /// True if the record links `a` and `b`, in either direction.
    pub fn involves_pair(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender_id == a && &self.receiver_id == b)
            || (&self.sender_id == b && &self.receiver_id == a)
    }

    pub fn direction_for(&self, me: &UserId) -> Option<Direction> {
        if &self.sender_id == me {
            Some(Direction::Sent)
        } else if &self.receiver_id == me {
            Some(Direction::Received)
        } else {
            None
        }
    }

    pub fn counterpart_of(&self, me: &UserId) -> Option<&UserId> {
        match self.direction_for(me)? {
            Direction::Sent => Some(&self.receiver_id),
            Direction::Received => Some(&self.sender_id),
        }
    }

    pub fn counterpart_profile(&self, me: &UserId) -> Option<&UserSummary> {
        match self.direction_for(me)? {
            Direction::Sent => self.receiver.as_ref(),
            Direction::Received => self.sender.as_ref(),
        }
    }
}

/// Locally rendered connection state for one counterpart.
///
/// All-`None` means "no known connection", which is also the safe default
/// whenever the remote store cannot be reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionViewState {
    pub status: Option<ConnectionStatus>,
    pub direction: Option<Direction>,
    pub connection_id: Option<ConnectionId>,
    /// Set between a mutating action and its remote confirmation.
    pub is_optimistic: bool,
}

impl ConnectionViewState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn confirmed(
        status: ConnectionStatus,
        direction: Direction,
        connection_id: Option<ConnectionId>,
    ) -> Self {
        Self {
            status: Some(status),
            direction: Some(direction),
            connection_id,
            is_optimistic: false,
        }
    }

    pub fn optimistic(
        status: ConnectionStatus,
        direction: Direction,
        connection_id: Option<ConnectionId>,
    ) -> Self {
        Self {
            is_optimistic: true,
            ..Self::confirmed(status, direction, connection_id)
        }
    }

    /// Projects a remote record onto the viewer `me`. Records that don't
    /// involve `me` resolve to the empty state.
    pub fn from_record(record: &ConnectionRecord, me: &UserId) -> Self {
        match record.direction_for(me) {
            Some(direction) => {
                Self::confirmed(record.status, direction, Some(record.id.clone()))
            }
            None => Self::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_some_and(ConnectionStatus::is_active)
    }
}
