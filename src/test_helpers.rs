use std::path::PathBuf;

use crate::config::Config;
use crate::models::{
    ChatMessage, OptionType, Signal, TradeAction, TradeStatus, User, WatchlistItem,
};
use crate::sheet::SheetSnapshot;

/// A NIFTY call with a fixed timestamp, no targets and sheet row 0.
pub fn make_signal(id: &str, status: TradeStatus, entry: f64) -> Signal {
    Signal {
        id: id.to_string(),
        date: None,
        instrument: "NIFTY".to_string(),
        symbol: "24000 CE".to_string(),
        option_type: OptionType::CE,
        action: TradeAction::Buy,
        entry_price: entry,
        stop_loss: entry - 10.0,
        targets: Vec::new(),
        targets_hit: 0.0,
        trailing_sl: None,
        status,
        timestamp: "2024-01-15T09:30:00.000Z".to_string(),
        last_traded_timestamp: None,
        pnl_points: None,
        pnl_rupees: None,
        comment: None,
        quantity: 75.0,
        cmp: None,
        is_btst: false,
        sheet_index: Some(0),
    }
}

pub fn make_watch(symbol: &str, price: f64) -> WatchlistItem {
    WatchlistItem {
        symbol: symbol.to_string(),
        price,
        change: 0.0,
        is_positive: true,
        last_updated: "2024-01-15T09:30:00.000Z".to_string(),
    }
}

pub fn make_admin_message(id: &str, timestamp: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        user_id: "ADMIN".to_string(),
        sender_name: "Desk".to_string(),
        text: format!("intel {}", id),
        timestamp: timestamp.to_string(),
        is_admin_reply: true,
        broadcaster: String::new(),
    }
}

/// A subscriber with a perpetual plan and no device binding.
pub fn make_user(id: &str, phone: &str, password: &str) -> User {
    User {
        id: id.to_string(),
        phone_number: phone.to_string(),
        name: format!("User {}", id),
        expiry_date: "PERPETUAL".to_string(),
        is_admin: false,
        password: Some(password.to_string()),
        last_password: None,
        device_id: None,
    }
}

pub fn snapshot_with(signals: Vec<Signal>) -> SheetSnapshot {
    SheetSnapshot {
        signals,
        ..Default::default()
    }
}

/// Fresh empty directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("libra-test-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A Config for tests: unreachable endpoint, no retry delay, temp state dir.
pub fn default_test_config() -> Config {
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
            .join("libra-test-state")
            .to_string_lossy()
            .to_string(),
        device_id: Some("LQN-TEST".to_string()),
        log_level: "debug".to_string(),
    }
}
