#![allow(dead_code)]

use std::sync::Arc;

use libra_terminal::config::Config;
use libra_terminal::engine::{ManualClock, Terminal};
use libra_terminal::models::{
    ChatMessage, OptionType, Signal, TradeAction, TradeStatus, WatchlistItem,
};
use libra_terminal::notify::RecordingNotifier;
use libra_terminal::sheet::{ScriptedSource, SheetSnapshot};

pub const START_MS: i64 = 1_705_300_000_000;

/// A BANKNIFTY put at the given sheet row.
pub fn signal(id: &str, status: TradeStatus, entry: f64, row: usize) -> Signal {
    Signal {
        id: id.to_string(),
        instrument: "BANKNIFTY".to_string(),
        symbol: "48000 PE".to_string(),
        option_type: OptionType::PE,
        action: TradeAction::Buy,
        entry_price: entry,
        stop_loss: entry - 20.0,
        targets: vec![entry + 20.0, entry + 40.0],
        status,
        timestamp: "2024-01-15T04:00:00.000Z".to_string(),
        quantity: 15.0,
        sheet_index: Some(row),
        ..Default::default()
    }
}

pub fn watch(symbol: &str, price: f64) -> WatchlistItem {
    WatchlistItem {
        symbol: symbol.to_string(),
        price,
        change: 0.0,
        is_positive: true,
        last_updated: String::new(),
    }
}

pub fn intel(id: &str, timestamp: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        user_id: "ADMIN".to_string(),
        text: format!("desk note {}", id),
        timestamp: timestamp.to_string(),
        is_admin_reply: true,
        ..Default::default()
    }
}

pub fn snapshot(signals: Vec<Signal>) -> SheetSnapshot {
    SheetSnapshot {
        signals,
        ..Default::default()
    }
}

pub fn test_config() -> Config {
    Config {
        script_url: "http://127.0.0.1:9/exec".to_string(),
        fetch_retries: 1,
        retry_delay_ms: 0,
        poll_interval_secs: 8,
        sweep_interval_ms: 1000,
        major_alert_ms: 15_000,
        intel_alert_ms: 60_000,
        session_duration_hours: 8,
        state_dir: std::env::temp_dir()
            .join("libra-it-state")
            .to_string_lossy()
            .to_string(),
        device_id: Some("LQN-IT".to_string()),
        log_level: "debug".to_string(),
    }
}

pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: ManualClock,
    pub terminal: Arc<Terminal>,
}

pub fn harness(source: ScriptedSource) -> Harness {
    let source = Arc::new(source);
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = ManualClock::new(START_MS);
    let terminal = Arc::new(Terminal::new(
        &test_config(),
        source.clone(),
        notifier.clone(),
        Arc::new(clock.clone()),
    ));
    Harness {
        source,
        notifier,
        clock,
        terminal,
    }
}
