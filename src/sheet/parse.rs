//! Lenient decoding of the spreadsheet script's JSON.
//!
//! Column headers in the sheet are edited by hand, so every lookup matches
//! keys case-insensitively and ignores whitespace, `_` and `-`. Cells come
//! back as strings, numbers or booleans depending on how they were typed.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::SheetError;
use crate::models::{
    ChatMessage, InsightData, InsightKind, LogEntry, LogKind, OptionType, Signal, TradeAction,
    TradeStatus, User, WatchlistItem,
};
use crate::sheet::SheetSnapshot;

const TRUTHY: &[&str] = &["TRUE", "YES", "Y", "BTST", "B.T.S.T", "ADMIN", "OK", "1"];

type Row = Map<String, Value>;

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

pub fn get_val<'a>(row: &'a Row, key: &str) -> Option<&'a Value> {
    let target = normalize_key(key);
    row.iter()
        .find(|(k, _)| normalize_key(k) == target)
        .map(|(_, v)| v)
}

/// Text of a cell, or `None` for missing and falsy cells (`null`, `false`,
/// `0`, empty string).
fn truthy_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn get_str(row: &Row, key: &str) -> String {
    truthy_text(get_val(row, key)).unwrap_or_default()
}

fn get_trimmed(row: &Row, key: &str) -> String {
    get_str(row, key).trim().to_string()
}

fn opt_text(row: &Row, key: &str) -> Option<String> {
    truthy_text(get_val(row, key))
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch ms of a sheet timestamp: RFC 3339, or naive date-time read as UTC.
pub fn timestamp_ms(ts: &str) -> Option<i64> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Parse the leading float of `s`:
/// optional sign, digits, optional fraction; trailing junk is ignored.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    s[..end].parse::<f64>().ok()
}

/// Numeric cell with currency symbols, commas and units stripped.
pub fn get_num(row: &Row, key: &str) -> Option<f64> {
    let raw = match get_val(row, key)? {
        Value::Null => return None,
        Value::Number(n) => return n.as_f64(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if raw.trim().is_empty() {
        return None;
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    parse_float_prefix(&cleaned)
}

fn loose_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    }
}

pub fn is_true(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        other => {
            let text = truthy_text(other).unwrap_or_default();
            let s = text.trim().to_uppercase().replace('.', "");
            TRUTHY.contains(&s.as_str())
        }
    }
}

pub fn normalize_status(value: Option<&Value>) -> TradeStatus {
    let raw = match value {
        None | Some(Value::Null) => return TradeStatus::Active,
        Some(Value::String(s)) if s.is_empty() => return TradeStatus::Active,
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let s = raw.trim().to_uppercase();
    if s == "3" || s.contains("ALL TARGET") {
        TradeStatus::AllTarget
    } else if s.contains("PARTIAL") || s.contains("BOOKED") {
        TradeStatus::Partial
    } else if s.contains("STOP") || s.contains("SL HIT") || s.contains("LOSS") {
        TradeStatus::Stopped
    } else if s.contains("EXIT") || s.contains("CLOSE") || s.contains("SQUARE") {
        TradeStatus::Exited
    } else {
        TradeStatus::Active
    }
}

/// Collapse every whitespace run into a single `-`.
fn dash_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn parse_targets(value: Option<&Value>) -> Vec<f64> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            s.split(',').filter_map(parse_float_prefix).collect()
        }
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|t| match t {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_float_prefix(s),
                _ => None,
            })
            .collect(),
        Some(Value::Number(n)) => n.as_f64().into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Decode one signal row. Rows without an instrument, symbol or a non-zero
/// entry price are blank or half-typed and are dropped.
pub fn parse_signal_row(row: &Row, index: usize) -> Option<Signal> {
    let instrument = get_trimmed(row, "instrument");
    let symbol = get_trimmed(row, "symbol");
    let entry_price = get_num(row, "entryPrice");

    if instrument.chars().count() < 2 || symbol.is_empty() {
        return None;
    }
    let entry_price = match entry_price {
        Some(p) if p != 0.0 => p,
        _ => return None,
    };

    let timestamp = opt_text(row, "timestamp");
    let id = match opt_text(row, "id") {
        Some(raw) => raw.trim().to_string(),
        None => dash_whitespace(&format!(
            "sig-{}-{}-{}-{}",
            instrument,
            symbol,
            entry_price,
            timestamp.clone().unwrap_or_else(|| index.to_string())
        )),
    };

    Some(Signal {
        id,
        date: opt_text(row, "date"),
        instrument,
        symbol,
        option_type: OptionType::parse(&get_str(row, "type")).unwrap_or_default(),
        action: TradeAction::parse(&get_str(row, "action")),
        entry_price,
        stop_loss: get_num(row, "stopLoss").unwrap_or(0.0),
        targets: parse_targets(get_val(row, "targets")),
        targets_hit: get_num(row, "targetsHit").unwrap_or(0.0),
        trailing_sl: get_num(row, "trailingSL"),
        status: normalize_status(get_val(row, "status")),
        timestamp: timestamp.unwrap_or_else(now_iso),
        last_traded_timestamp: opt_text(row, "lastTradedTimestamp"),
        pnl_points: get_num(row, "pnlPoints"),
        pnl_rupees: get_num(row, "pnlRupees"),
        comment: opt_text(row, "comment"),
        quantity: get_num(row, "quantity").unwrap_or(0.0),
        cmp: get_num(row, "cmp"),
        is_btst: is_true(get_val(row, "isBTST")),
        sheet_index: None,
    })
}

pub fn parse_watchlist_row(row: &Row) -> Option<WatchlistItem> {
    let symbol = get_str(row, "symbol");
    if symbol.is_empty() {
        return None;
    }
    Some(WatchlistItem {
        symbol,
        price: loose_number(get_val(row, "price")),
        change: loose_number(get_val(row, "change")),
        is_positive: is_true(get_val(row, "isPositive")),
        last_updated: get_str(row, "lastUpdated"),
    })
}

fn non_blank(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

pub fn parse_user_row(row: &Row) -> User {
    let id = opt_text(row, "id")
        .or_else(|| opt_text(row, "userId"))
        .unwrap_or_default();
    let name = opt_text(row, "name").unwrap_or_else(|| "Client".to_string());
    let device = opt_text(row, "deviceId")
        .or_else(|| opt_text(row, "hwid"))
        .or_else(|| opt_text(row, "hardwareid"))
        .unwrap_or_default();

    User {
        id: id.trim().to_string(),
        phone_number: get_trimmed(row, "phoneNumber"),
        name: name.trim().to_string(),
        expiry_date: get_trimmed(row, "expiryDate"),
        is_admin: is_true(get_val(row, "isAdmin")),
        password: non_blank(get_trimmed(row, "password")),
        last_password: non_blank(get_trimmed(row, "lastPassword")),
        device_id: non_blank(device.trim().to_string()),
    }
}

pub fn parse_log_row(row: &Row) -> LogEntry {
    let details = match get_val(row, "details").or_else(|| get_val(row, "detail")) {
        Some(v @ Value::Object(_)) | Some(v @ Value::Array(_)) => v.to_string(),
        other => truthy_text(other).unwrap_or_default(),
    };
    LogEntry {
        timestamp: opt_text(row, "timestamp").unwrap_or_else(now_iso),
        user: opt_text(row, "user").unwrap_or_else(|| "System".to_string()),
        action: opt_text(row, "action").unwrap_or_else(|| "N/A".to_string()),
        details,
        kind: LogKind::parse(&get_str(row, "type")),
    }
}

pub fn parse_message_row(row: &Row) -> ChatMessage {
    let text = get_trimmed(row, "text");
    let timestamp = get_trimmed(row, "timestamp");
    let id = match non_blank(get_trimmed(row, "id")) {
        Some(id) => id,
        None => {
            let head: String = text.chars().take(10).collect();
            dash_whitespace(&format!("msg-{}-{}", head, timestamp))
        }
    };

    let broadcaster = opt_text(row, "broadcaster")
        .or_else(|| opt_text(row, "senderName"))
        .or_else(|| opt_text(row, "adminName"))
        .filter(|b| !b.eq_ignore_ascii_case("undefined"))
        .map(|b| b.trim().to_string())
        .unwrap_or_default();

    ChatMessage {
        id,
        user_id: get_trimmed(row, "userId"),
        sender_name: broadcaster.clone(),
        text,
        timestamp: non_blank(timestamp).unwrap_or_else(now_iso),
        is_admin_reply: is_true(get_val(row, "isAdminReply")),
        broadcaster,
    }
}

pub fn parse_insight_row(row: &Row) -> InsightData {
    InsightData {
        kind: InsightKind::parse(&get_str(row, "type")),
        symbol: get_trimmed(row, "symbol"),
        sentiment: opt_text(row, "sentiment"),
        strength: get_num(row, "strength"),
        category: opt_text(row, "category"),
        trend: opt_text(row, "trend"),
        pattern: opt_text(row, "pattern"),
        phase: opt_text(row, "phase"),
        view_origin: get_num(row, "originPrice").or_else(|| get_num(row, "viewOrigin")),
        cmp: get_num(row, "cmp"),
        date: get_trimmed(row, "date"),
    }
}

/// Parse a response body that may be wrapped in an HTML error page or
/// carry leading junk from the script host.
pub fn robust_parse_json(text: &str) -> Result<Value, SheetError> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Ok(v);
    }

    if let Some(span) = json_span(trimmed) {
        return serde_json::from_str::<Value>(span).map_err(|_| SheetError::Corrupted);
    }

    if trimmed.to_lowercase().contains("<!doctype html>") {
        return Err(SheetError::AccessDenied);
    }
    Err(SheetError::InvalidFormat)
}

/// From the first `{` or `[` through the last matching closer.
fn json_span(text: &str) -> Option<&str> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn rows<'a>(data: &'a Value, key: &str) -> impl Iterator<Item = (usize, &'a Row)> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or(&[])
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_object().map(|o| (i, o)))
}

pub fn parse_snapshot(data: &Value) -> SheetSnapshot {
    let signals = rows(data, "signals")
        .filter_map(|(i, row)| {
            parse_signal_row(row, i).map(|mut s| {
                s.sheet_index = Some(i);
                s
            })
        })
        .collect();

    SheetSnapshot {
        signals,
        history: rows(data, "history")
            .filter_map(|(i, row)| parse_signal_row(row, i))
            .collect(),
        watchlist: rows(data, "watchlist")
            .filter_map(|(_, row)| parse_watchlist_row(row))
            .collect(),
        users: rows(data, "users").map(|(_, row)| parse_user_row(row)).collect(),
        logs: rows(data, "logs").map(|(_, row)| parse_log_row(row)).collect(),
        messages: rows(data, "messages")
            .map(|(_, row)| parse_message_row(row))
            .collect(),
        insights: rows(data, "insights")
            .map(|(_, row)| parse_insight_row(row))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn keys_match_ignoring_case_and_separators() {
        let r = row(json!({ "Entry Price": "105", "stop_loss": 90, "TARGETS-HIT": 1 }));
        assert_eq!(get_num(&r, "entryPrice"), Some(105.0));
        assert_eq!(get_num(&r, "stopLoss"), Some(90.0));
        assert_eq!(get_num(&r, "targetsHit"), Some(1.0));
        assert_eq!(get_num(&r, "missing"), None);
    }

    #[test]
    fn numbers_are_stripped_of_units() {
        let r = row(json!({ "pnl": "₹1,250.50 /-", "blank": "  ", "neg": "-12.5pts" }));
        assert_eq!(get_num(&r, "pnl"), Some(1250.50));
        assert_eq!(get_num(&r, "blank"), None);
        assert_eq!(get_num(&r, "neg"), Some(-12.5));
    }

    #[test]
    fn float_prefix() {
        assert_eq!(parse_float_prefix(" 110 "), Some(110.0));
        assert_eq!(parse_float_prefix("12.5.3"), Some(12.5));
        assert_eq!(parse_float_prefix("-.5"), Some(-0.5));
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("abc"), None);
    }

    #[test]
    fn truthy_values() {
        assert!(is_true(Some(&json!(true))));
        assert!(is_true(Some(&json!(1))));
        assert!(is_true(Some(&json!("b.t.s.t"))));
        assert!(is_true(Some(&json!(" yes "))));
        assert!(!is_true(Some(&json!("no"))));
        assert!(!is_true(Some(&json!(0))));
        assert!(!is_true(None));
    }

    #[test]
    fn status_normalisation() {
        assert_eq!(normalize_status(None), TradeStatus::Active);
        assert_eq!(normalize_status(Some(&json!(""))), TradeStatus::Active);
        assert_eq!(normalize_status(Some(&json!(3))), TradeStatus::AllTarget);
        assert_eq!(normalize_status(Some(&json!("all target done"))), TradeStatus::AllTarget);
        assert_eq!(normalize_status(Some(&json!("Partial Booked"))), TradeStatus::Partial);
        assert_eq!(normalize_status(Some(&json!("SL HIT"))), TradeStatus::Stopped);
        assert_eq!(normalize_status(Some(&json!("Square off"))), TradeStatus::Exited);
        assert_eq!(normalize_status(Some(&json!("running"))), TradeStatus::Active);
    }

    #[test]
    fn signal_row_requires_instrument_symbol_and_entry() {
        assert!(parse_signal_row(&row(json!({ "instrument": "N", "symbol": "X", "entryPrice": 5 })), 0).is_none());
        assert!(parse_signal_row(&row(json!({ "instrument": "NIFTY", "symbol": "", "entryPrice": 5 })), 0).is_none());
        assert!(parse_signal_row(&row(json!({ "instrument": "NIFTY", "symbol": "X", "entryPrice": 0 })), 0).is_none());
        assert!(parse_signal_row(&row(json!({ "instrument": "NIFTY", "symbol": "X", "entryPrice": "5" })), 0).is_some());
    }

    #[test]
    fn signal_row_fields() {
        let r = row(json!({
            "ID": " SIG-1 ",
            "Instrument": "NIFTY",
            "Symbol": "24500",
            "Type": "pe",
            "Action": "SELL",
            "Entry Price": 120,
            "Stop Loss": "100",
            "Targets": "140, 160,abc",
            "Status": "SL HIT",
            "Is BTST": "BTST",
            "Trailing SL": "",
            "Comment": "booked early",
            "Quantity": "75"
        }));
        let s = parse_signal_row(&r, 4).unwrap();
        assert_eq!(s.id, "SIG-1");
        assert_eq!(s.option_type, OptionType::PE);
        assert_eq!(s.action, TradeAction::Sell);
        assert_eq!(s.stop_loss, 100.0);
        assert_eq!(s.targets, vec![140.0, 160.0]);
        assert_eq!(s.status, TradeStatus::Stopped);
        assert!(s.is_btst);
        assert_eq!(s.trailing_sl, None);
        assert_eq!(s.comment.as_deref(), Some("booked early"));
        assert_eq!(s.quantity, 75.0);
    }

    #[test]
    fn missing_signal_id_is_synthesised() {
        let r = row(json!({ "instrument": "BANK NIFTY", "symbol": "52000 CE", "entryPrice": 310.5 }));
        let s = parse_signal_row(&r, 7).unwrap();
        assert_eq!(s.id, "sig-BANK-NIFTY-52000-CE-310.5-7");

        let r = row(json!({ "instrument": "NIFTY", "symbol": "X", "entryPrice": 100, "timestamp": "2024-01-01 09:15" }));
        let s = parse_signal_row(&r, 0).unwrap();
        assert_eq!(s.id, "sig-NIFTY-X-100-2024-01-01-09:15");
    }

    #[test]
    fn targets_accept_arrays_and_scalars() {
        assert_eq!(parse_targets(Some(&json!([110, "120", "x"]))), vec![110.0, 120.0]);
        assert_eq!(parse_targets(Some(&json!(130))), vec![130.0]);
        assert!(parse_targets(Some(&json!("  "))).is_empty());
        assert!(parse_targets(None).is_empty());
    }

    #[test]
    fn message_row_defaults() {
        let m = parse_message_row(&row(json!({
            "text": "Market looks strong today",
            "timestamp": "2024-01-01T10:00:00Z",
            "isAdminReply": "TRUE",
            "broadcaster": "undefined"
        })));
        assert_eq!(m.id, "msg-Market-loo-2024-01-01T10:00:00Z");
        assert!(m.is_admin_reply);
        assert_eq!(m.broadcaster, "");

        let m = parse_message_row(&row(json!({ "id": "m1", "text": "x", "adminName": " Desk " })));
        assert_eq!(m.id, "m1");
        assert_eq!(m.broadcaster, "Desk");
        assert_eq!(m.sender_name, "Desk");
    }

    #[test]
    fn user_row_device_aliases() {
        let u = parse_user_row(&row(json!({
            "userId": "U1", "phone number": " 9876543210 ", "HWID": "LQN-ABC", "isAdmin": "no"
        })));
        assert_eq!(u.id, "U1");
        assert_eq!(u.name, "Client");
        assert_eq!(u.phone_number, "9876543210");
        assert_eq!(u.device_id.as_deref(), Some("LQN-ABC"));
        assert!(u.password.is_none());
        assert!(!u.is_admin);
    }

    #[test]
    fn log_row_serialises_object_details() {
        let l = parse_log_row(&row(json!({ "details": { "a": 1 }, "type": "trade" })));
        assert_eq!(l.details, "{\"a\":1}");
        assert_eq!(l.kind, LogKind::Trade);
        assert_eq!(l.user, "System");
        assert_eq!(l.action, "N/A");
    }

    #[test]
    fn robust_json_recovers_wrapped_payload() {
        let v = robust_parse_json("  garbage {\"signals\": []} trailing").unwrap();
        assert!(v.get("signals").is_some());

        assert!(matches!(robust_parse_json("x {\"a\": } y"), Err(SheetError::Corrupted)));
        assert!(matches!(
            robust_parse_json("<!DOCTYPE html><html>denied</html>"),
            Err(SheetError::AccessDenied)
        ));
        assert!(matches!(robust_parse_json("nope"), Err(SheetError::InvalidFormat)));
    }

    #[test]
    fn snapshot_keeps_raw_row_index() {
        let data = json!({
            "signals": [
                { "instrument": "NIFTY", "symbol": "A", "entryPrice": 100, "id": "a" },
                { "instrument": "", "symbol": "blank" },
                { "instrument": "NIFTY", "symbol": "B", "entryPrice": 200, "id": "b" }
            ],
            "watchlist": [ { "symbol": "NIFTY", "price": "22000.5" }, { "price": 1 } ]
        });
        let snap = parse_snapshot(&data);
        assert_eq!(snap.signals.len(), 2);
        assert_eq!(snap.signals[1].sheet_index, Some(2));
        assert_eq!(snap.watchlist.len(), 1);
        assert_eq!(snap.watchlist[0].price, 22000.5);
        assert!(snap.history.is_empty());
        assert!(snap.users.is_empty());
    }
}
