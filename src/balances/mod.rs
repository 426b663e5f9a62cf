//! Batched room balance queries.
//!
//! One form-encoded POST carries every room as `roomIds=[{"DORM_ID": ...}]`.
//! The response array does not echo identifiers, so entries are paired with
//! the request purely by position.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::auth::core::{Session, TransportError};
use crate::modules::events::{PortalEvent, RoomFailureEvent};

/// Form field carrying the JSON-encoded room list.
pub const ROOM_IDS_FIELD: &str = "roomIds";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("balance query requires an authenticated session")]
    NotAuthenticated,
    #[error("balance query request failed: {0}")]
    Request(#[source] TransportError),
    #[error("balance response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("balance response is not a JSON array")]
    NotAnArray,
    #[error("balance response has {actual} entries for {expected} rooms")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Outcome for one requested room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomBalance {
    pub id: String,
    /// The server's `roomInfo` object when `retcode == 0`.
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RoomBalance {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// Human readable room name (`roomName`).
    pub fn room_name(&self) -> Option<&str> {
        self.result.as_ref()?.get("roomName")?.as_str()
    }

    /// Remaining balance (`syje`), reported either as a number or a numeric string.
    pub fn balance(&self) -> Option<f64> {
        match self.result.as_ref()?.get("syje")? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Request body for `ids`, in input order.
pub fn room_ids_payload<S: AsRef<str>>(ids: &[S]) -> Vec<(String, String)> {
    let rooms: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "DORM_ID": id.as_ref() }))
        .collect();
    vec![(ROOM_IDS_FIELD.to_string(), Value::Array(rooms).to_string())]
}

/// Issue one batched balance query for `ids` on an authenticated session.
///
/// The result has exactly one entry per input id, in input order. A room the
/// server rejects (`retcode != 0`) yields `result: None` plus the server's
/// message; only request-level failures are errors.
pub async fn query_balances<S: AsRef<str>>(
    session: &Session,
    api: &Url,
    ids: &[S],
) -> Result<Vec<RoomBalance>, QueryError> {
    if !session.is_authenticated() {
        return Err(QueryError::NotAuthenticated);
    }
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let response = session
        .post_form(api, &room_ids_payload(ids))
        .await
        .map_err(QueryError::Request)?;
    if !response.is_success() {
        return Err(QueryError::Request(TransportError::Status {
            url: api.clone(),
            status: response.status,
        }));
    }

    let entries = match serde_json::from_slice::<Value>(&response.body)? {
        Value::Array(entries) => entries,
        _ => return Err(QueryError::NotAnArray),
    };
    if entries.len() != ids.len() {
        return Err(QueryError::LengthMismatch {
            expected: ids.len(),
            actual: entries.len(),
        });
    }

    let balances: Vec<RoomBalance> = ids
        .iter()
        .zip(entries)
        .map(|(id, entry)| classify(id.as_ref(), entry))
        .collect();

    for balance in balances.iter().filter(|b| !b.is_success()) {
        session.events().dispatch(PortalEvent::RoomFailure(RoomFailureEvent {
            room_id: balance.id.clone(),
            message: balance.message.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        }));
    }

    Ok(balances)
}

fn classify(id: &str, mut entry: Value) -> RoomBalance {
    let Some(info) = entry.get_mut("roomInfo").map(Value::take) else {
        return RoomBalance {
            id: id.to_string(),
            result: None,
            message: Some("response entry has no roomInfo".into()),
        };
    };

    if retcode(&info) == Some(0) {
        return RoomBalance {
            id: id.to_string(),
            result: Some(info),
            message: None,
        };
    }

    let message = ["msg", "message", "retmsg"]
        .iter()
        .find_map(|key| info.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("retcode {}", info.get("retcode").unwrap_or(&Value::Null)));

    RoomBalance {
        id: id.to_string(),
        result: None,
        message: Some(message),
    }
}

fn retcode(info: &Value) -> Option<i64> {
    match info.get("retcode")? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
