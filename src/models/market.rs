use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{InsightKind, LogKind};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub is_positive: bool,
    #[serde(default)]
    pub last_updated: String,
}

/// Broadcast or chat entry. Only admin replies are "intel".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp: String,
    pub is_admin_reply: bool,
    #[serde(default)]
    pub broadcaster: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub phone_number: String,
    pub name: String,
    pub expiry_date: String,
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_password: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl User {
    /// Profile without credentials, as kept in the local session.
    pub fn public_profile(&self, device_id: &str) -> User {
        User {
            id: self.id.clone(),
            phone_number: self.phone_number.clone(),
            name: self.name.clone(),
            expiry_date: self.expiry_date.clone(),
            is_admin: self.is_admin,
            password: None,
            last_password: None,
            device_id: Some(device_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub user: String,
    pub action: String,
    pub details: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightData {
    #[serde(rename = "type")]
    pub kind: Option<InsightKind>,
    pub symbol: String,
    pub sentiment: Option<String>,
    pub strength: Option<f64>,
    pub category: Option<String>,
    pub trend: Option<String>,
    pub pattern: Option<String>,
    pub phase: Option<String>,
    pub view_origin: Option<f64>,
    pub cmp: Option<f64>,
    pub date: String,
}

/// One board line: kind, symbol, then whichever readings the row carries.
impl fmt::Display for InsightData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            Some(InsightKind::Trend) => "TREND",
            Some(InsightKind::Dominance) => "DOMINANCE",
            Some(InsightKind::Flow) => "FLOW",
            None => "INSIGHT",
        };
        write!(f, "{:<9} {:<12}", kind, self.symbol)?;

        let labels = [
            ("sentiment", &self.sentiment),
            ("trend", &self.trend),
            ("pattern", &self.pattern),
            ("phase", &self.phase),
            ("category", &self.category),
        ];
        for (label, value) in labels {
            if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                write!(f, " {}={}", label, v)?;
            }
        }
        if let Some(strength) = self.strength {
            write!(f, " strength={}", strength)?;
        }
        if let Some(cmp) = self.cmp {
            write!(f, " cmp={}", cmp)?;
        }
        Ok(())
    }
}
