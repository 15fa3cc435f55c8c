use std::collections::HashMap;

use crate::engine::reconciler::{FieldDiff, Reconciliation};

/// What one sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub signals: Vec<String>,
    pub symbols: Vec<String>,
    pub intel_cleared: bool,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.symbols.is_empty() && !self.intel_cleared
    }
}

/// Live highlight windows, keyed by absolute expiry in epoch ms.
///
/// A signal's field highlights live exactly as long as its alert record;
/// both go in the same sweep.
#[derive(Debug, Clone)]
pub struct AlertStore {
    major: HashMap<String, i64>,
    highlights: HashMap<String, FieldDiff>,
    watchlist: HashMap<String, i64>,
    intel_until: Option<i64>,
    major_ms: i64,
    intel_ms: i64,
}

impl AlertStore {
    pub fn new(major_ms: i64, intel_ms: i64) -> Self {
        Self {
            major: HashMap::new(),
            highlights: HashMap::new(),
            watchlist: HashMap::new(),
            intel_until: None,
            major_ms,
            intel_ms,
        }
    }

    /// Open or extend windows for everything the poll changed.
    pub fn apply(&mut self, r: &Reconciliation, now: i64) {
        let expires = now + self.major_ms;
        for id in &r.major_ids {
            self.major.insert(id.clone(), expires);
        }
        for (id, diff) in &r.diffs {
            self.highlights.insert(id.clone(), diff.clone());
            self.major.insert(id.clone(), expires);
        }
        for symbol in &r.changed_symbols {
            self.watchlist.insert(symbol.clone(), expires);
        }
    }

    pub fn mark_intel(&mut self, now: i64) {
        self.intel_until = Some(now + self.intel_ms);
    }

    /// Drop every window that has run out, all in one pass.
    pub fn sweep(&mut self, now: i64) -> SweepReport {
        let mut report = SweepReport::default();

        self.major.retain(|id, &mut expires| {
            let keep = now < expires;
            if !keep {
                report.signals.push(id.clone());
            }
            keep
        });
        for id in &report.signals {
            self.highlights.remove(id);
        }

        self.watchlist.retain(|symbol, &mut expires| {
            let keep = now < expires;
            if !keep {
                report.symbols.push(symbol.clone());
            }
            keep
        });

        if matches!(self.intel_until, Some(t) if now >= t) {
            self.intel_until = None;
            report.intel_cleared = true;
        }

        report.signals.sort();
        report.symbols.sort();
        report
    }

    pub fn major_expiry(&self, id: &str) -> Option<i64> {
        self.major.get(id).copied()
    }

    pub fn highlight(&self, id: &str) -> Option<&FieldDiff> {
        self.highlights.get(id)
    }

    pub fn watchlist_expiry(&self, symbol: &str) -> Option<i64> {
        self.watchlist.get(symbol).copied()
    }

    pub fn intel_until(&self) -> Option<i64> {
        self.intel_until
    }

    pub fn active_signals(&self) -> usize {
        self.major.len()
    }

    pub fn is_empty(&self) -> bool {
        self.major.is_empty() && self.watchlist.is_empty() && self.intel_until.is_none()
    }
}
