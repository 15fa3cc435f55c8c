use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::{device_reset_payload, expiry_deadline, is_perpetual};
use crate::engine::{SyncOutcome, Terminal};
use crate::error::{EditError, SheetError};
use crate::models::{ChatMessage, LogEntry, OptionType, Signal, TradeAction, TradeStatus, User};
use crate::sheet::parse::timestamp_ms;
use crate::sheet::WriteRequest;

const SOON_DAYS: f64 = 5.0;

/// Subscription health as shown in the user table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    Safe,
    Soon,
    Expired,
}

impl std::fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiryStatus::Safe => write!(f, "ACTIVE"),
            ExpiryStatus::Soon => write!(f, "EXPIRING SOON"),
            ExpiryStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Blank, perpetual and unreadable dates are all treated as safe here.
pub fn expiry_status(expiry: &str, now: DateTime<Utc>) -> ExpiryStatus {
    if expiry.trim().is_empty() || is_perpetual(expiry) {
        return ExpiryStatus::Safe;
    }
    let Some(deadline) = expiry_deadline(expiry) else {
        return ExpiryStatus::Safe;
    };
    let remaining_ms = (deadline.with_timezone(&Utc) - now).num_milliseconds();
    if remaining_ms < 0 {
        return ExpiryStatus::Expired;
    }
    let days = remaining_ms as f64 / 86_400_000.0;
    if days <= SOON_DAYS {
        ExpiryStatus::Soon
    } else {
        ExpiryStatus::Safe
    }
}

/// Signals an administrator can still act on.
pub fn open_signals(signals: &[Signal]) -> Vec<&Signal> {
    signals.iter().filter(|s| s.status.is_open()).collect()
}

/// Case-insensitive name match or phone substring.
pub fn search_users<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return users.iter().collect();
    }
    users
        .iter()
        .filter(|u| u.name.to_lowercase().contains(&q) || u.phone_number.contains(&q))
        .collect()
}

/// Newest first; unreadable timestamps sink to the bottom.
pub fn sorted_logs(logs: &[LogEntry]) -> Vec<&LogEntry> {
    let mut sorted: Vec<&LogEntry> = logs.iter().collect();
    sorted.sort_by_key(|l| std::cmp::Reverse(timestamp_ms(&l.timestamp).unwrap_or(i64::MIN)));
    sorted
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSignal {
    pub instrument: String,
    /// Stock name used in place of the generic `STOCKS` instrument.
    pub custom_stock: Option<String>,
    pub symbol: String,
    pub option_type: OptionType,
    pub action: TradeAction,
    pub entry_price: f64,
    pub quantity: Option<u32>,
    pub is_btst: bool,
}

impl NewSignal {
    pub fn resolved_instrument(&self) -> String {
        match self.custom_stock.as_deref().map(str::trim) {
            Some(name) if self.instrument == "STOCKS" && !name.is_empty() => name.to_uppercase(),
            _ => self.instrument.clone(),
        }
    }
}

/// Editable subscriber fields; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserEdit {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub expiry_date: Option<String>,
    pub is_admin: Option<bool>,
    pub password: Option<String>,
}

impl UserEdit {
    fn payload(&self, id: &str) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), json!(id));
        if let Some(v) = &self.name {
            map.insert("name".into(), json!(v));
        }
        if let Some(v) = &self.phone_number {
            map.insert("phoneNumber".into(), json!(v));
        }
        if let Some(v) = &self.expiry_date {
            map.insert("expiryDate".into(), json!(v));
        }
        if let Some(v) = self.is_admin {
            map.insert("isAdmin".into(), json!(v));
        }
        if let Some(v) = &self.password {
            map.insert("password".into(), json!(v));
        }
        Value::Object(map)
    }
}

/// Changes to a published signal, read from `field=value` words:
/// `status`, `entry`, `sl`, `tsl`, `targets` (comma list), `hit`, `qty`.
/// `comment=` takes the rest of the line; an empty comment clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalEdit {
    pub status: Option<TradeStatus>,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub trailing_sl: Option<f64>,
    pub targets: Option<Vec<f64>>,
    pub targets_hit: Option<f64>,
    pub quantity: Option<f64>,
    pub comment: Option<String>,
}

impl SignalEdit {
    pub fn parse(text: &str) -> Result<Self, EditError> {
        let (fields, comment) = match text.find("comment=") {
            Some(at) => (
                &text[..at],
                Some(text[at + "comment=".len()..].trim().to_string()),
            ),
            None => (text, None),
        };

        let mut edit = SignalEdit {
            comment,
            ..Default::default()
        };
        for word in fields.split_whitespace() {
            let (key, value) = word
                .split_once('=')
                .ok_or_else(|| EditError::UnknownField(word.to_string()))?;
            let bad = || EditError::BadValue {
                field: key.to_string(),
                value: value.to_string(),
            };
            let num = |raw: &str| raw.trim().parse::<f64>().ok().filter(|v| v.is_finite());

            match key.to_lowercase().as_str() {
                "status" => edit.status = Some(TradeStatus::parse(value).ok_or_else(bad)?),
                "entry" => edit.entry_price = Some(num(value).ok_or_else(bad)?),
                "sl" => edit.stop_loss = Some(num(value).ok_or_else(bad)?),
                "tsl" => edit.trailing_sl = Some(num(value).ok_or_else(bad)?),
                "hit" => edit.targets_hit = Some(num(value).ok_or_else(bad)?),
                "qty" => edit.quantity = Some(num(value).ok_or_else(bad)?),
                "targets" => {
                    let targets = value
                        .split(',')
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| num(t).ok_or_else(bad))
                        .collect::<Result<Vec<f64>, _>>()?;
                    edit.targets = Some(targets);
                }
                _ => return Err(EditError::UnknownField(key.to_string())),
            }
        }

        if edit == SignalEdit::default() {
            return Err(EditError::Empty);
        }
        Ok(edit)
    }

    pub fn apply(&self, signal: &Signal) -> Signal {
        let mut s = signal.clone();
        if let Some(v) = self.status {
            s.status = v;
        }
        if let Some(v) = self.entry_price {
            s.entry_price = v;
        }
        if let Some(v) = self.stop_loss {
            s.stop_loss = v;
        }
        if let Some(v) = self.trailing_sl {
            s.trailing_sl = Some(v);
        }
        if let Some(v) = &self.targets {
            s.targets = v.clone();
        }
        if let Some(v) = self.targets_hit {
            s.targets_hit = v;
        }
        if let Some(v) = self.quantity {
            s.quantity = v;
        }
        if let Some(c) = &self.comment {
            s.comment = (!c.is_empty()).then(|| c.clone());
        }
        s
    }
}

fn iso(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Administrator actions. Every successful write is followed by a hard
/// resync so the console shows what the sheet now holds.
pub struct AdminConsole {
    terminal: Arc<Terminal>,
    broadcaster: Option<String>,
    exit_settle: Duration,
}

impl AdminConsole {
    pub fn new(terminal: Arc<Terminal>) -> Self {
        Self {
            terminal,
            broadcaster: None,
            exit_settle: Duration::from_millis(1500),
        }
    }

    /// Name shown on broadcasts. Blank hides it.
    pub fn with_broadcaster(mut self, name: &str) -> Self {
        let name = name.trim();
        self.broadcaster = (!name.is_empty()).then(|| name.to_string());
        self
    }

    /// Wait before resyncing after an urgent exit, giving the sheet script
    /// time to settle the row.
    pub fn with_exit_settle(mut self, delay: Duration) -> Self {
        self.exit_settle = delay;
        self
    }

    pub fn terminal(&self) -> &Arc<Terminal> {
        &self.terminal
    }

    async fn send(&self, request: WriteRequest) -> Result<(), SheetError> {
        self.terminal.source().write(&request).await
    }

    /// Publish a new signal. Returns its id, or `None` when the symbol or
    /// entry is missing.
    pub async fn add_signal(
        &self,
        signal: &NewSignal,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, SheetError> {
        if signal.symbol.trim().is_empty() || !signal.entry_price.is_finite() {
            return Ok(None);
        }
        let id = format!("SIG-{}", now.timestamp_millis());
        let payload = json!({
            "id": id,
            "instrument": signal.resolved_instrument(),
            "symbol": signal.symbol.trim(),
            "type": signal.option_type,
            "action": signal.action,
            "entryPrice": signal.entry_price,
            "quantity": signal.quantity.map(Value::from).unwrap_or_else(|| json!("")),
            "isBTST": signal.is_btst,
            "timestamp": iso(now),
        });
        self.send(WriteRequest::add_signal(payload)).await?;
        info!("Published {} {} {}", id, signal.resolved_instrument(), signal.symbol);
        self.terminal.hard_resync().await;
        Ok(Some(id))
    }

    /// Force a signal closed at market.
    pub async fn urgent_exit(&self, signal: &Signal, now: DateTime<Utc>) -> Result<(), SheetError> {
        let payload = json!({
            "id": signal.id,
            "instrument": signal.instrument,
            "symbol": signal.symbol,
            "status": TradeStatus::Exited,
            "exit input": "EXIT_NOW",
            "lastTradedTimestamp": iso(now),
            "sheetIndex": signal.sheet_index,
        });
        self.send(WriteRequest::patch_signal(&signal.id, payload)).await?;
        info!("Urgent exit sent for {}", signal.label());
        if !self.exit_settle.is_zero() {
            tokio::time::sleep(self.exit_settle).await;
        }
        self.terminal.hard_resync().await;
        Ok(())
    }

    /// Broadcast intel to every terminal. Blank text is ignored.
    pub async fn post_intel(
        &self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, SheetError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let message = ChatMessage {
            id: format!("msg-{}", now.timestamp_millis()),
            user_id: "ADMIN".to_string(),
            sender_name: String::new(),
            text: text.to_string(),
            timestamp: iso(now),
            is_admin_reply: true,
            broadcaster: self.broadcaster.clone().unwrap_or_default(),
        };
        self.send(WriteRequest::add_message(&message)?).await?;
        info!("Intel {} posted", message.id);
        self.terminal.hard_resync().await;
        Ok(Some(message.id))
    }

    /// Write an edited signal back. Unlike the other writes this syncs
    /// without a hard resync, so a closing edit stays pinned against
    /// stale rows.
    pub async fn edit_signal(
        &self,
        signal: &Signal,
        edit: &SignalEdit,
    ) -> Result<SyncOutcome, SheetError> {
        let updated = edit.apply(signal);
        info!("Editing {} -> {}", signal.label(), updated.status);
        self.terminal.update_signal(&updated).await
    }

    pub async fn update_user(&self, id: &str, edit: &UserEdit) -> Result<(), SheetError> {
        self.send(WriteRequest::update_user(id, edit.payload(id))).await?;
        info!("Updated subscriber {}", id);
        self.terminal.hard_resync().await;
        Ok(())
    }

    /// Clear a subscriber's device binding.
    pub async fn reset_device(&self, user: &User) -> Result<(), SheetError> {
        self.send(WriteRequest::update_user(&user.id, device_reset_payload(&user.id)))
            .await?;
        info!("Device lock cleared for {}", user.name);
        self.terminal.hard_resync().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ManualClock;
    use crate::models::LogKind;
    use crate::notify::RecordingNotifier;
    use crate::sheet::{ScriptedSource, WriteAction};
    use crate::test_helpers::{default_test_config, make_signal, make_user, snapshot_with};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn expiry_status_windows() {
        let now = at("2024-03-10T06:30:00Z");
        assert_eq!(expiry_status("PERPETUAL", now), ExpiryStatus::Safe);
        assert_eq!(expiry_status("", now), ExpiryStatus::Safe);
        assert_eq!(expiry_status("not a date", now), ExpiryStatus::Safe);
        assert_eq!(expiry_status("09-03-2024", now), ExpiryStatus::Expired);
        assert_eq!(expiry_status("14-03-2024", now), ExpiryStatus::Soon);
        assert_eq!(expiry_status("2024-04-30", now), ExpiryStatus::Safe);
    }

    #[test]
    fn search_by_name_or_phone() {
        let mut a = make_user("u1", "9876543210", "k");
        a.name = "Anil Kumar".to_string();
        let mut b = make_user("u2", "9123456789", "k");
        b.name = "Bina".to_string();
        let users = vec![a, b];

        let hits = search_users(&users, "anil");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "u1");
        assert_eq!(search_users(&users, "91234")[0].id, "u2");
        assert_eq!(search_users(&users, " ").len(), 2);
    }

    #[test]
    fn logs_newest_first() {
        let log = |ts: &str, action: &str| LogEntry {
            timestamp: ts.to_string(),
            user: "x".to_string(),
            action: action.to_string(),
            details: String::new(),
            kind: LogKind::Security,
        };
        let logs = vec![
            log("2024-01-01T09:00:00Z", "first"),
            log("garbage", "unknown"),
            log("2024-01-02T09:00:00Z", "second"),
        ];
        let order: Vec<&str> = sorted_logs(&logs).iter().map(|l| l.action.as_str()).collect();
        assert_eq!(order, vec!["second", "first", "unknown"]);
    }

    #[test]
    fn custom_stock_overrides_instrument() {
        let mut s = NewSignal {
            instrument: "STOCKS".to_string(),
            custom_stock: Some(" tatamotors ".to_string()),
            symbol: "900 CE".to_string(),
            option_type: OptionType::CE,
            action: TradeAction::Buy,
            entry_price: 12.5,
            quantity: None,
            is_btst: false,
        };
        assert_eq!(s.resolved_instrument(), "TATAMOTORS");
        s.instrument = "NIFTY".to_string();
        assert_eq!(s.resolved_instrument(), "NIFTY");
    }

    #[test]
    fn user_edit_only_sends_set_fields() {
        let edit = UserEdit {
            expiry_date: Some("31-12-2025".to_string()),
            ..Default::default()
        };
        let payload = edit.payload("u1");
        assert_eq!(payload, json!({ "id": "u1", "expiryDate": "31-12-2025" }));
    }

    #[test]
    fn signal_edit_words() {
        let edit = SignalEdit::parse("status=exited sl=92.5 targets=120,135 comment=booked early").unwrap();
        assert_eq!(edit.status, Some(TradeStatus::Exited));
        assert_eq!(edit.stop_loss, Some(92.5));
        assert_eq!(edit.targets, Some(vec![120.0, 135.0]));
        assert_eq!(edit.comment.as_deref(), Some("booked early"));

        assert_eq!(SignalEdit::parse("  "), Err(EditError::Empty));
        assert_eq!(
            SignalEdit::parse("colour=red"),
            Err(EditError::UnknownField("colour".to_string()))
        );
        assert_eq!(
            SignalEdit::parse("sl=abc"),
            Err(EditError::BadValue {
                field: "sl".to_string(),
                value: "abc".to_string()
            })
        );
        assert!(SignalEdit::parse("status=exitted").is_err());
    }

    #[test]
    fn signal_edit_applies_only_set_fields() {
        let mut original = make_signal("A", TradeStatus::Active, 100.0);
        original.comment = Some("watch 24k".to_string());

        let edited = SignalEdit::parse("tsl=104 hit=1").unwrap().apply(&original);
        assert_eq!(edited.trailing_sl, Some(104.0));
        assert_eq!(edited.targets_hit, 1.0);
        assert_eq!(edited.entry_price, 100.0);
        assert_eq!(edited.comment.as_deref(), Some("watch 24k"));

        let cleared = SignalEdit::parse("comment=").unwrap().apply(&original);
        assert_eq!(cleared.comment, None);
    }

    #[tokio::test]
    async fn closing_edit_writes_and_stays_pinned() {
        let source = Arc::new(ScriptedSource::new());
        source.push(snapshot_with(vec![make_signal("A", TradeStatus::Active, 100.0)]));
        let terminal = Arc::new(Terminal::new(
            &default_test_config(),
            source.clone(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        ));
        terminal.sync(true).await;
        let console = AdminConsole::new(terminal.clone());

        let signal = terminal.state().await.signals[0].clone();
        let edit = SignalEdit::parse("status=sl").unwrap();
        let outcome = console.edit_signal(&signal, &edit).await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Applied(Some(_))));
        let writes = source.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].action, WriteAction::UpdateSignal);
        assert_eq!(writes[0].payload["status"], json!("STOP LOSS HIT"));

        // The sheet still serves ACTIVE; the pinned edit wins
        assert!(terminal.is_pinned("A").await);
        terminal.sync(false).await;
        assert_eq!(terminal.state().await.signals[0].status, TradeStatus::Stopped);
    }
}
