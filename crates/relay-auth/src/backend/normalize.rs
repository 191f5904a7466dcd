//! Identity backend response normalization.
//!
//! The backend has been observed to answer with the identity record at
//! several nesting depths: flat, under `user`, under `data`, under
//! `data.user`, or under `data.data`. Everything above this module sees a
//! single [`BackendIdentity`] regardless of the envelope.

use serde_json::{Map, Value};

use relay_core::traits::identity_backend::{BackendError, BackendIdentity};
use relay_core::types::id::IdentityId;

/// Envelope keys that may wrap the identity record, in lookup order.
const ENVELOPE_KEYS: [&str; 2] = ["data", "user"];

/// Deepest envelope nesting followed before giving up.
const MAX_DEPTH: usize = 4;

/// Normalizes a backend response body into a single identity record.
pub fn normalize_identity(body: &Value) -> Result<BackendIdentity, BackendError> {
    let record = find_record(body, 0).ok_or_else(|| {
        BackendError::InvalidResponse("no identity record with an 'id' field".into())
    })?;

    let id = record
        .get("id")
        .and_then(identity_id)
        .ok_or_else(|| BackendError::InvalidResponse("identity 'id' is empty or not scalar".into()))?;

    Ok(BackendIdentity {
        id,
        email: string_field(record, &["email"]),
        role: role_field(record),
        permissions: permissions_field(record),
        display_name: string_field(record, &["display_name", "displayName", "name", "username"]),
    })
}

fn find_record(value: &Value, depth: usize) -> Option<&Map<String, Value>> {
    let object = value.as_object()?;
    if object.contains_key("id") {
        return Some(object);
    }
    if depth >= MAX_DEPTH {
        return None;
    }
    ENVELOPE_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(|inner| find_record(inner, depth + 1))
}

fn identity_id(value: &Value) -> Option<IdentityId> {
    let id = match value {
        Value::String(s) => IdentityId::new(s.as_str()),
        Value::Number(n) => IdentityId::new(n.to_string()),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn string_field(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// `role` may be a string or an object with a `name`; `roles` may be a list.
fn role_field(record: &Map<String, Value>) -> Option<String> {
    let named = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("name").and_then(Value::as_str).map(String::from),
        _ => None,
    };
    record
        .get("role")
        .and_then(named)
        .or_else(|| {
            record
                .get("roles")
                .and_then(Value::as_array)
                .and_then(|roles| roles.first())
                .and_then(named)
        })
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
}

/// Absent or null means "not reported"; a present list is taken as-is.
fn permissions_field(record: &Map<String, Value>) -> Option<Vec<String>> {
    let list = record.get("permissions")?.as_array()?;
    Some(
        list.iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("name").and_then(Value::as_str).map(String::from),
                _ => None,
            })
            .collect(),
    )
}
