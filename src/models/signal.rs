use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::models::{OptionType, TradeAction, TradeStatus};

/// A published trade recommendation as read from the sheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    #[serde(default)]
    pub date: Option<String>,
    pub instrument: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub action: TradeAction,
    pub entry_price: f64,
    pub stop_loss: f64,
    #[serde(default)]
    pub targets: Vec<f64>,
    #[serde(default)]
    pub targets_hit: f64,
    #[serde(default, rename = "trailingSL")]
    pub trailing_sl: Option<f64>,
    pub status: TradeStatus,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub last_traded_timestamp: Option<String>,
    #[serde(default)]
    pub pnl_points: Option<f64>,
    #[serde(default)]
    pub pnl_rupees: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub cmp: Option<f64>,
    #[serde(default, rename = "isBTST")]
    pub is_btst: bool,
    /// Row position in the live tab. Higher means appended later.
    #[serde(default)]
    pub sheet_index: Option<usize>,
}

/// The fields compared between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalField {
    Instrument,
    Symbol,
    OptionType,
    Action,
    EntryPrice,
    StopLoss,
    Targets,
    Status,
    TargetsHit,
    IsBtst,
    TrailingSl,
    Comment,
    Quantity,
}

impl SignalField {
    pub const ALL: [SignalField; 13] = [
        SignalField::Instrument,
        SignalField::Symbol,
        SignalField::OptionType,
        SignalField::Action,
        SignalField::EntryPrice,
        SignalField::StopLoss,
        SignalField::Targets,
        SignalField::Status,
        SignalField::TargetsHit,
        SignalField::IsBtst,
        SignalField::TrailingSl,
        SignalField::Comment,
        SignalField::Quantity,
    ];

    /// Whether a change in this field warrants sound and focus.
    /// Quantity edits only highlight.
    pub fn is_alert_trigger(&self) -> bool {
        !matches!(self, SignalField::Quantity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalField::Instrument => "instrument",
            SignalField::Symbol => "symbol",
            SignalField::OptionType => "type",
            SignalField::Action => "action",
            SignalField::EntryPrice => "entryPrice",
            SignalField::StopLoss => "stopLoss",
            SignalField::Targets => "targets",
            SignalField::Status => "status",
            SignalField::TargetsHit => "targetsHit",
            SignalField::IsBtst => "isBTST",
            SignalField::TrailingSl => "trailingSL",
            SignalField::Comment => "comment",
            SignalField::Quantity => "quantity",
        }
    }
}

impl fmt::Display for SignalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Signal {
    /// Value equality of a single tracked field.
    pub fn field_eq(&self, other: &Signal, field: SignalField) -> bool {
        match field {
            SignalField::Instrument => self.instrument == other.instrument,
            SignalField::Symbol => self.symbol == other.symbol,
            SignalField::OptionType => self.option_type == other.option_type,
            SignalField::Action => self.action == other.action,
            SignalField::EntryPrice => self.entry_price == other.entry_price,
            SignalField::StopLoss => self.stop_loss == other.stop_loss,
            SignalField::Targets => self.targets == other.targets,
            SignalField::Status => self.status == other.status,
            SignalField::TargetsHit => self.targets_hit == other.targets_hit,
            SignalField::IsBtst => self.is_btst == other.is_btst,
            SignalField::TrailingSl => self.trailing_sl == other.trailing_sl,
            SignalField::Comment => self.comment == other.comment,
            SignalField::Quantity => self.quantity == other.quantity,
        }
    }

    /// Tracked fields whose values differ from `previous`.
    pub fn changed_fields(&self, previous: &Signal) -> Vec<SignalField> {
        SignalField::ALL
            .iter()
            .copied()
            .filter(|&f| !self.field_eq(previous, f))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn label(&self) -> String {
        format!(
            "{} {} {} {}",
            self.instrument, self.symbol, self.option_type, self.action
        )
    }
}

/// Open signals first, then most recently appended.
pub fn dashboard_order(signals: &[Signal]) -> Vec<&Signal> {
    let mut ordered: Vec<&Signal> = signals.iter().collect();
    ordered.sort_by(|a, b| match (a.status.is_open(), b.status.is_open()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.sheet_index.unwrap_or(0).cmp(&a.sheet_index.unwrap_or(0)),
    });
    ordered
}
