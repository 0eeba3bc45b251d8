use serde::{Deserialize, Serialize};

use crate::models::{ConnectionId, ConnectionRecord, ConnectionStatus, ConnectionViewState, Direction, UserId};

// -- Requests --

/// Body of `POST /connections`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    pub receiver_id: UserId,
}

/// Body of `PATCH /connections/respond/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondRequest {
    pub status: ConnectionStatus,
}

// -- Joined connection data --

/// Connection data a parent surface already holds from a list endpoint.
/// Handing it to a view-model on mount skips the remote lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub status: ConnectionStatus,
    pub direction: Direction,
    pub connection_id: Option<ConnectionId>,
}

impl ConnectionInfo {
    pub fn from_record(record: &ConnectionRecord, me: &UserId) -> Option<Self> {
        Some(Self {
            status: record.status,
            direction: record.direction_for(me)?,
            connection_id: Some(record.id.clone()),
        })
    }

    pub fn into_view_state(self) -> ConnectionViewState {
        ConnectionViewState::confirmed(self.status, self.direction, self.connection_id)
    }
}

// -- Local cache --

/// Persisted cache payload, stored under `connection_<counterpartId>`.
/// `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedConnection {
    pub status: Option<ConnectionStatus>,
    pub direction: Option<Direction>,
    pub connection_id: Option<ConnectionId>,
    pub timestamp: i64,
}

impl CachedConnection {
    pub fn new(state: &ConnectionViewState, timestamp: i64) -> Self {
        Self {
            status: state.status,
            direction: state.direction,
            connection_id: state.connection_id.clone(),
            timestamp,
        }
    }

    pub fn view_state(&self) -> ConnectionViewState {
        ConnectionViewState {
            status: self.status,
            direction: self.direction,
            connection_id: self.connection_id.clone(),
            is_optimistic: false,
        }
    }
}
