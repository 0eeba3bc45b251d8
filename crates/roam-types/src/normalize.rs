//! Ingestion boundary for REST payloads.
//!
//! The backend returns several shapes for the same entity (`_id` vs `id`,
//! populated user objects vs bare ids, wrapped vs bare lists). Everything is
//! mapped into the canonical types here so nothing downstream has to try
//! alternative field names.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::models::{ConnectionId, ConnectionRecord, ConnectionStatus, UserId, UserSummary};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unrecognized connection status `{0}`")]
    UnknownStatus(String),

    #[error("unexpected payload shape: expected {0}")]
    UnexpectedShape(&'static str),
}

const ID_KEYS: &[&str] = &["_id", "id"];
const SENDER_KEYS: &[&str] = &["senderId", "sender_id", "sender"];
const RECEIVER_KEYS: &[&str] = &["receiverId", "receiver_id", "receiver"];
const LIST_WRAPPER_KEYS: &[&str] = &["connections", "data", "buddies", "requests"];

/// First present value, treating `null` and `""` as absent.
fn first<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !v.is_null() && v.as_str() != Some(""))
}

/// First key that yields a usable id.
fn first_id(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| value.get(*k)).find_map(id_of)
}

/// First key holding a populated user object. A record may carry both
/// `senderId` and an included `sender`.
fn first_user(value: &Value, keys: &[&str]) -> Option<UserSummary> {
    keys.iter().filter_map(|k| value.get(*k)).find_map(user_summary)
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    first(value, keys).and_then(|v| v.as_str()).map(str::to_string)
}

/// An id is either a scalar or an object carrying `_id`/`id`.
fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => first_id(value, ID_KEYS),
        _ => None,
    }
}

fn timestamp(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    let raw = first_str(value, keys)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Normalizes a user object. Returns `None` for anything without an id.
pub fn user_summary(value: &Value) -> Option<UserSummary> {
    if !value.is_object() {
        return None;
    }
    let id = first_id(value, ID_KEYS)?;

    let is_premium = first(value, &["premium", "isPremium", "is_premium"])
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(UserSummary {
        id: UserId::new(id),
        name: first_str(value, &["name", "fullName", "username"]),
        profile_image: first_str(value, &["profileImage", "avatar", "image"]),
        is_premium,
    })
}

/// Normalizes one connection record.
pub fn connection_record(value: &Value) -> Result<ConnectionRecord, NormalizeError> {
    if !value.is_object() {
        return Err(NormalizeError::UnexpectedShape("connection object"));
    }

    let id = first_id(value, ID_KEYS).ok_or(NormalizeError::MissingField("id"))?;
    let sender_id = first_id(value, SENDER_KEYS).ok_or(NormalizeError::MissingField("senderId"))?;
    let receiver_id =
        first_id(value, RECEIVER_KEYS).ok_or(NormalizeError::MissingField("receiverId"))?;

    let raw_status = first_str(value, &["status"]).ok_or(NormalizeError::MissingField("status"))?;
    let status = ConnectionStatus::parse_loose(&raw_status)
        .ok_or(NormalizeError::UnknownStatus(raw_status))?;

    Ok(ConnectionRecord {
        id: ConnectionId::new(id),
        sender_id: UserId::new(sender_id),
        receiver_id: UserId::new(receiver_id),
        status,
        created_at: timestamp(value, &["createdAt", "created_at"]),
        updated_at: timestamp(value, &["updatedAt", "updated_at"]),
        sender: first_user(value, SENDER_KEYS),
        receiver: first_user(value, RECEIVER_KEYS),
    })
}

/// Normalizes a listing response: a bare array or an object wrapping one.
/// Malformed entries are skipped rather than failing the whole list.
pub fn connection_list(value: &Value) -> Result<Vec<ConnectionRecord>, NormalizeError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => first(value, LIST_WRAPPER_KEYS)
            .and_then(Value::as_array)
            .ok_or(NormalizeError::UnexpectedShape("connection list"))?,
        _ => return Err(NormalizeError::UnexpectedShape("connection list")),
    };

    let records = items
        .iter()
        .filter_map(|item| match connection_record(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed connection record: {}", e);
                None
            }
        })
        .collect();

    Ok(records)
}

/// Extracts the id assigned by `POST /connections`. Accepts the record itself,
/// `{connection: {...}}`, `{data: {...}}`, or a bare `{id}`.
pub fn created_connection_id(value: &Value) -> Result<ConnectionId, NormalizeError> {
    let target = first(value, &["connection", "data"])
        .filter(|v| v.is_object())
        .unwrap_or(value);

    first_id(target, ID_KEYS)
        .map(ConnectionId::new)
        .ok_or(NormalizeError::MissingField("id"))
}

/// Best-effort human message from an error body.
pub fn error_message(value: &Value) -> Option<String> {
    match first(value, &["message", "error", "msg"])? {
        Value::String(s) => Some(s.clone()),
        nested @ Value::Object(_) => first_str(nested, &["message"]),
        _ => None,
    }
}
