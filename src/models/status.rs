use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TradeStatus {
    #[default]
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "PARTIAL BOOKED")]
    Partial,
    #[serde(rename = "EXITED")]
    Exited,
    #[serde(rename = "STOP LOSS HIT")]
    Stopped,
    #[serde(rename = "ALL TARGET DONE")]
    AllTarget,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Active => "ACTIVE",
            TradeStatus::Partial => "PARTIAL BOOKED",
            TradeStatus::Exited => "EXITED",
            TradeStatus::Stopped => "STOP LOSS HIT",
            TradeStatus::AllTarget => "ALL TARGET DONE",
        }
    }

    /// Strict form for operator input: the wire names plus short aliases.
    /// Unknown text is rejected rather than read as ACTIVE.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw
            .trim()
            .to_uppercase()
            .replace(|c| c == '_' || c == '-', " ");
        match s.as_str() {
            "ACTIVE" => Some(TradeStatus::Active),
            "PARTIAL" | "PARTIAL BOOKED" => Some(TradeStatus::Partial),
            "EXIT" | "EXITED" => Some(TradeStatus::Exited),
            "SL" | "STOPPED" | "STOP LOSS HIT" => Some(TradeStatus::Stopped),
            "TARGET" | "ALL TARGET" | "ALL TARGET DONE" => Some(TradeStatus::AllTarget),
            _ => None,
        }
    }

    /// STOPPED, EXITED and ALL_TARGET never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Stopped | TradeStatus::Exited | TradeStatus::AllTarget
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TradeStatus::Active | TradeStatus::Partial)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OptionType {
    #[default]
    CE,
    PE,
    FUT,
}

impl OptionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "CE" => Some(OptionType::CE),
            "PE" => Some(OptionType::PE),
            "FUT" => Some(OptionType::FUT),
            _ => None,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::CE => write!(f, "CE"),
            OptionType::PE => write!(f, "PE"),
            OptionType::FUT => write!(f, "FUT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    #[default]
    Buy,
    Sell,
}

impl TradeAction {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("SELL") {
            TradeAction::Sell
        } else {
            TradeAction::Buy
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogKind {
    Security,
    Trade,
    User,
    #[default]
    System,
}

impl LogKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SECURITY" => LogKind::Security,
            "TRADE" => LogKind::Trade,
            "USER" => LogKind::User,
            _ => LogKind::System,
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Security => write!(f, "SECURITY"),
            LogKind::Trade => write!(f, "TRADE"),
            LogKind::User => write!(f, "USER"),
            LogKind::System => write!(f, "SYSTEM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InsightKind {
    Trend,
    Dominance,
    Flow,
}

impl InsightKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "TREND" => Some(InsightKind::Trend),
            "DOMINANCE" => Some(InsightKind::Dominance),
            "FLOW" => Some(InsightKind::Flow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Error,
    #[default]
    Syncing,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
            ConnectionStatus::Syncing => write!(f, "syncing"),
        }
    }
}
