use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Asia::Kolkata;
use std::collections::HashMap;

use crate::models::Signal;

const INDICES: &[&str] = &["NIFTY", "BANKNIFTY", "FINNIFTY", "MIDCPNIFTY", "SENSEX"];
const ROLLING_DAYS: i64 = 30;
const CHART_DAYS: i64 = 14;

#[derive(Debug, Clone)]
pub struct PerformanceReport {
    // Rolling window
    pub window_start: NaiveDate,
    pub audit_start: Option<NaiveDate>,
    pub audit_end: Option<NaiveDate>,
    pub trades: usize,

    // Outcome
    pub rolling_pnl: f64,
    pub index_pnl: f64,
    pub stock_pnl: f64,

    // Consistency, percent of decided trades that won
    pub overall_pct: f64,
    pub intraday_pct: f64,
    pub overnight_pct: f64,

    // Daily P&L, oldest first
    pub daily: Vec<(NaiveDate, f64)>,
}

fn ist_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Kolkata).date_naive()
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Calendar day a trade closed on, in IST. Prefers the last traded time,
/// then the sheet date, then the creation time.
pub fn trade_date(trade: &Signal) -> Option<NaiveDate> {
    let raw = [
        trade.last_traded_timestamp.as_deref(),
        trade.date.as_deref(),
        Some(trade.timestamp.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|s| !s.is_empty())?;

    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(ist_date(dt.with_timezone(&Utc)));
        }
    }

    if raw.contains('-') {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts[0].len() == 4 && parts.len() >= 3 {
            let day: String = parts[2].chars().take_while(|c| c.is_ascii_digit()).collect();
            return ymd(parts[0], parts[1], &day);
        }
        if parts.len() == 3 && parts[2].len() == 4 {
            return ymd(parts[2], parts[1], parts[0]);
        }
    }

    if raw.contains('/') {
        let parts: Vec<&str> = raw.split('/').collect();
        if parts.len() == 3 {
            let year = if parts[2].len() == 4 {
                parts[2].to_string()
            } else {
                format!("20{}", parts[2])
            };
            return ymd(&year, parts[1], parts[0]);
        }
    }

    None
}

/// Closed live signals plus history rows, one entry per id. History wins
/// on a clash.
pub fn closed_trades<'a>(signals: &'a [Signal], history: &'a [Signal]) -> Vec<&'a Signal> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, &Signal> = HashMap::new();
    let mut put = |key: String, s: &'a Signal| {
        if by_id.insert(key.clone(), s).is_none() {
            order.push(key);
        }
    };

    for s in signals.iter().filter(|s| s.is_closed() && !s.id.is_empty()) {
        put(s.id.clone(), s);
    }
    for s in history {
        let key = if s.id.is_empty() {
            let date = trade_date(s).map(|d| d.to_string()).unwrap_or_default();
            format!("hist-{}-{}-{}", date, s.symbol, s.entry_price)
        } else {
            s.id.clone()
        };
        put(key, s);
    }

    order.iter().filter_map(|k| by_id.get(k).copied()).collect()
}

/// Rupee P&L if the sheet has it, else points times quantity.
fn pnl_value(trade: &Signal) -> f64 {
    match trade.pnl_rupees {
        Some(r) => r,
        None => {
            let qty = if trade.quantity > 0.0 { trade.quantity } else { 1.0 };
            trade.pnl_points.unwrap_or(0.0) * qty
        }
    }
}

fn success_score(trade: &Signal) -> f64 {
    trade.pnl_rupees.or(trade.pnl_points).unwrap_or(0.0)
}

/// Share of winners among trades that were not flat.
pub fn consistency(scores: &[f64]) -> f64 {
    let decided: Vec<f64> = scores.iter().copied().filter(|v| *v != 0.0).collect();
    if decided.is_empty() {
        return 0.0;
    }
    let wins = decided.iter().filter(|v| **v > 0.0).count();
    wins as f64 / decided.len() as f64 * 100.0
}

pub fn is_index(instrument: &str) -> bool {
    let upper = instrument.trim().to_uppercase();
    INDICES.contains(&upper.as_str())
}

impl PerformanceReport {
    pub fn from_signals(signals: &[Signal], history: &[Signal], now: DateTime<Utc>) -> Self {
        let today = ist_date(now);
        let window_start = ist_date(now - Duration::days(ROLLING_DAYS));

        let mut daily: Vec<(NaiveDate, f64)> = (0..CHART_DAYS)
            .rev()
            .map(|i| (ist_date(now - Duration::days(i)), 0.0))
            .collect();

        let mut rolling_pnl = 0.0;
        let mut index_pnl = 0.0;
        let mut stock_pnl = 0.0;
        let mut overall = Vec::new();
        let mut intraday = Vec::new();
        let mut overnight = Vec::new();
        let mut audit_start: Option<NaiveDate> = None;
        let mut audit_end: Option<NaiveDate> = None;

        for trade in closed_trades(signals, history) {
            let Some(date) = trade_date(trade) else {
                continue;
            };
            let pnl = pnl_value(trade);
            let score = success_score(trade);

            if date >= window_start {
                rolling_pnl += pnl;
                overall.push(score);
                audit_start = Some(audit_start.map_or(date, |d| d.min(date)));
                audit_end = Some(audit_end.map_or(date, |d| d.max(date)));

                if is_index(&trade.instrument) {
                    index_pnl += pnl;
                } else {
                    stock_pnl += pnl;
                }
                if trade.is_btst {
                    overnight.push(score);
                } else {
                    intraday.push(score);
                }
            }

            if let Some(slot) = daily.iter_mut().find(|(d, _)| *d == date) {
                slot.1 += pnl;
            }
        }

        Self {
            window_start,
            audit_start,
            audit_end: audit_end.or(Some(today)),
            trades: overall.len(),
            rolling_pnl,
            index_pnl,
            stock_pnl,
            overall_pct: consistency(&overall),
            intraday_pct: consistency(&intraday),
            overnight_pct: consistency(&overnight),
            daily,
        }
    }

    pub fn print_summary(&self) {
        let fmt_date = |d: Option<NaiveDate>| {
            d.map(|d| d.format("%d %b").to_string().to_uppercase())
                .unwrap_or_else(|| "--".to_string())
        };

        println!("\n{}", "=".repeat(70));
        println!("  PERFORMANCE AUDIT");
        println!("{}", "=".repeat(70));
        println!(
            "  Period: {} -> {} ({} trades)",
            fmt_date(self.audit_start),
            fmt_date(self.audit_end),
            self.trades
        );
        println!();
        println!("  30-DAY NET OUTCOME");
        println!("  ───────────────────────────────────");
        println!("  Total:       ₹{:+.0}", self.rolling_pnl);
        println!("  Index:       ₹{:+.0}", self.index_pnl);
        println!("  Stock:       ₹{:+.0}", self.stock_pnl);
        println!();
        println!("  CONSISTENCY");
        println!("  ───────────────────────────────────");
        println!("  Overall:     {:.1}%", self.overall_pct);
        println!("  Intraday:    {:.1}%", self.intraday_pct);
        println!("  Overnight:   {:.1}%", self.overnight_pct);
        println!();
        println!("  LAST {} DAYS", CHART_DAYS);
        println!("  ───────────────────────────────────");
        for (date, pnl) in &self.daily {
            println!("  {}  ₹{:+.0}", date.format("%d/%m"), pnl);
        }
        println!("{}", "=".repeat(70));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeStatus;
    use crate::test_helpers::make_signal;

    fn closed(id: &str, date: &str, pnl: f64, instrument: &str, btst: bool) -> Signal {
        let mut s = make_signal(id, TradeStatus::Exited, 100.0);
        s.last_traded_timestamp = Some(date.to_string());
        s.pnl_rupees = Some(pnl);
        s.instrument = instrument.to_string();
        s.is_btst = btst;
        s
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-20T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn normalises_sheet_dates() {
        let mut s = make_signal("A", TradeStatus::Exited, 100.0);
        s.timestamp = String::new();

        s.date = Some("2024-03-05".to_string());
        assert_eq!(trade_date(&s), NaiveDate::from_ymd_opt(2024, 3, 5));
        s.date = Some("05-03-2024".to_string());
        assert_eq!(trade_date(&s), NaiveDate::from_ymd_opt(2024, 3, 5));
        s.date = Some("5/3/24".to_string());
        assert_eq!(trade_date(&s), NaiveDate::from_ymd_opt(2024, 3, 5));

        // 20:00 UTC is already the next day in IST
        s.last_traded_timestamp = Some("2024-03-05T20:00:00Z".to_string());
        assert_eq!(trade_date(&s), NaiveDate::from_ymd_opt(2024, 3, 6));
    }

    #[test]
    fn history_and_live_merge_by_id() {
        let live = vec![
            closed("A", "2024-03-18", 100.0, "NIFTY", false),
            make_signal("OPEN", TradeStatus::Active, 100.0),
        ];
        let history = vec![
            closed("A", "2024-03-18", 250.0, "NIFTY", false),
            closed("B", "2024-03-17", -50.0, "NIFTY", false),
        ];
        let trades = closed_trades(&live, &history);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].pnl_rupees, Some(250.0));
    }

    #[test]
    fn rolling_window_and_split() {
        let history = vec![
            closed("A", "2024-03-18", 1000.0, "NIFTY", false),
            closed("B", "2024-03-19", -400.0, "TATAMOTORS", true),
            closed("C", "2024-03-19", 0.0, "SENSEX", false),
            closed("OLD", "2024-01-01", 99999.0, "NIFTY", false),
        ];
        let report = PerformanceReport::from_signals(&[], &history, now());

        assert_eq!(report.rolling_pnl, 600.0);
        assert_eq!(report.index_pnl, 1000.0);
        assert_eq!(report.stock_pnl, -400.0);
        assert_eq!(report.trades, 3);
        assert_eq!(report.overall_pct, 50.0);
        assert_eq!(report.intraday_pct, 100.0);
        assert_eq!(report.overnight_pct, 0.0);
        assert_eq!(report.audit_start, NaiveDate::from_ymd_opt(2024, 3, 18));
    }

    #[test]
    fn points_times_quantity_without_rupees() {
        let mut s = closed("A", "2024-03-20", 0.0, "NIFTY", false);
        s.pnl_rupees = None;
        s.pnl_points = Some(12.0);
        s.quantity = 50.0;
        let report = PerformanceReport::from_signals(&[], &[s], now());
        assert_eq!(report.rolling_pnl, 600.0);
        assert_eq!(report.overall_pct, 100.0);
    }

    #[test]
    fn daily_series_covers_fourteen_days() {
        let history = vec![closed("A", "2024-03-20", 300.0, "NIFTY", false)];
        let report = PerformanceReport::from_signals(&[], &history, now());
        assert_eq!(report.daily.len(), 14);
        assert_eq!(report.daily[13], (NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(), 300.0));
        assert_eq!(report.daily[0].0, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
    }

    #[test]
    fn consistency_ignores_flat_trades() {
        assert_eq!(consistency(&[]), 0.0);
        assert_eq!(consistency(&[0.0, 0.0]), 0.0);
        assert!((consistency(&[10.0, -5.0, 0.0, 3.0]) - 200.0 / 3.0).abs() < 1e-9);
    }
}
