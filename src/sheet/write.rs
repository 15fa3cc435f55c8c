use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::{ChatMessage, LogEntry, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteTarget {
    Signals,
    Users,
    Logs,
    Messages,
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Signals => write!(f, "signals"),
            WriteTarget::Users => write!(f, "users"),
            WriteTarget::Logs => write!(f, "logs"),
            WriteTarget::Messages => write!(f, "messages"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteAction {
    Add,
    UpdateSignal,
    UpdateUser,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteAction::Add => write!(f, "ADD"),
            WriteAction::UpdateSignal => write!(f, "UPDATE_SIGNAL"),
            WriteAction::UpdateUser => write!(f, "UPDATE_USER"),
        }
    }
}

/// Body of a POST to the sheet script: `{ target, action, payload, id }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub target: WriteTarget,
    pub action: WriteAction,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// The sheet stores targets as one comma-separated cell.
fn join_targets(mut payload: Value) -> Value {
    if let Some(obj) = payload.as_object_mut() {
        if let Some(Value::Array(targets)) = obj.get("targets") {
            let joined = targets
                .iter()
                .map(|t| match t {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            obj.insert("targets".to_string(), Value::String(joined));
        }
    }
    payload
}

impl WriteRequest {
    pub fn new(target: WriteTarget, action: WriteAction, payload: Value, id: Option<String>) -> Self {
        let payload = match target {
            WriteTarget::Signals => join_targets(payload),
            _ => payload,
        };
        Self {
            target,
            action,
            payload,
            id,
        }
    }

    pub fn add_signal(payload: Value) -> Self {
        Self::new(WriteTarget::Signals, WriteAction::Add, payload, None)
    }

    pub fn update_signal(signal: &Signal) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(signal)?;
        Ok(Self::new(
            WriteTarget::Signals,
            WriteAction::UpdateSignal,
            payload,
            Some(signal.id.clone()),
        ))
    }

    pub fn patch_signal(id: &str, payload: Value) -> Self {
        Self::new(
            WriteTarget::Signals,
            WriteAction::UpdateSignal,
            payload,
            Some(id.to_string()),
        )
    }

    pub fn update_user(id: &str, payload: Value) -> Self {
        Self::new(
            WriteTarget::Users,
            WriteAction::UpdateUser,
            payload,
            Some(id.to_string()),
        )
    }

    pub fn add_message(message: &ChatMessage) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            WriteTarget::Messages,
            WriteAction::Add,
            serde_json::to_value(message)?,
            None,
        ))
    }

    pub fn add_log(entry: &LogEntry) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            WriteTarget::Logs,
            WriteAction::Add,
            serde_json::to_value(entry)?,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeStatus;
    use crate::test_helpers::make_signal;
    use serde_json::json;

    #[test]
    fn signal_targets_are_joined() {
        let mut s = make_signal("A", TradeStatus::Active, 100.0);
        s.targets = vec![110.0, 120.5];
        let req = WriteRequest::update_signal(&s).unwrap();
        assert_eq!(req.payload["targets"], json!("110, 120.5"));
        assert_eq!(req.id.as_deref(), Some("A"));
    }

    #[test]
    fn wire_shape() {
        let req = WriteRequest::update_user("U1", json!({ "deviceId": "" }));
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "target": "users",
                "action": "UPDATE_USER",
                "payload": { "deviceId": "" },
                "id": "U1"
            })
        );

        let req = WriteRequest::add_signal(json!({ "symbol": "X" }));
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("id").is_none());
        assert_eq!(body["action"], json!("ADD"));
    }
}
