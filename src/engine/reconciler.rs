//! Poll-to-poll diffing.
//!
//! `reconcile` is a pure function of the previous accepted state and the
//! incoming (already dead-signal guarded) snapshot. It decides what changed
//! and how loudly; the caller applies the result in one step.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ChatMessage, Signal, SignalField, WatchlistItem};
use crate::sheet::parse::timestamp_ms;

pub type FieldDiff = BTreeSet<SignalField>;

pub struct ReconcileInput<'a> {
    /// Incoming live signals with pinned closed snapshots substituted.
    pub incoming_signals: Vec<Signal>,
    pub previous_signals: &'a [Signal],
    pub incoming_watchlist: &'a [WatchlistItem],
    pub previous_watchlist: &'a [WatchlistItem],
    pub incoming_messages: &'a [ChatMessage],
    pub previous_intel_id: Option<&'a str>,
    /// Baseline load: nothing is flagged regardless of content.
    pub is_initial: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub signals: Vec<Signal>,
    /// Changed tracked fields per signal id; only non-empty sets.
    pub diffs: BTreeMap<String, FieldDiff>,
    /// Signals with a new row or a changed alert-trigger field.
    pub major_ids: Vec<String>,
    pub changed_symbols: Vec<String>,
    pub signal_changed: bool,
    pub watchlist_changed: bool,
    pub intel_changed: bool,
    /// A tracked status change landed on a terminal status.
    pub critical: bool,
    /// A changed overnight-carry signal is still open.
    pub btst_update: bool,
    /// Most recently appended major signal, to bring into view.
    pub focus: Option<String>,
    /// Newest admin broadcast in this snapshot.
    pub latest_intel_id: Option<String>,
}

/// Newest admin-flagged message; ties keep sheet order.
pub fn latest_admin_message(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    let mut best: Option<(&ChatMessage, i64)> = None;
    for m in messages.iter().filter(|m| m.is_admin_reply) {
        let t = timestamp_ms(&m.timestamp).unwrap_or(i64::MIN);
        match best {
            Some((_, bt)) if t <= bt => {}
            _ => best = Some((m, t)),
        }
    }
    best.map(|(m, _)| m)
}

pub fn reconcile(input: ReconcileInput<'_>) -> Reconciliation {
    let ReconcileInput {
        incoming_signals,
        previous_signals,
        incoming_watchlist,
        previous_watchlist,
        incoming_messages,
        previous_intel_id,
        is_initial,
    } = input;

    let latest_intel_id = latest_admin_message(incoming_messages).map(|m| m.id.clone());

    if is_initial {
        return Reconciliation {
            signals: incoming_signals,
            latest_intel_id,
            ..Default::default()
        };
    }

    let mut out = Reconciliation {
        latest_intel_id,
        ..Default::default()
    };
    let mut top_index: Option<usize> = None;

    for s in &incoming_signals {
        let (diff, major) = match previous_signals.iter().find(|o| o.id == s.id) {
            None => (SignalField::ALL.iter().copied().collect::<FieldDiff>(), true),
            Some(old) => {
                let diff: FieldDiff = s.changed_fields(old).into_iter().collect();
                let major = diff.iter().any(|f| f.is_alert_trigger());
                if diff.contains(&SignalField::Status) && s.status.is_terminal() {
                    out.critical = true;
                }
                (diff, major)
            }
        };

        if major {
            out.signal_changed = true;
            out.major_ids.push(s.id.clone());
            if let Some(idx) = s.sheet_index {
                if top_index.map_or(true, |top| idx > top) {
                    top_index = Some(idx);
                    out.focus = Some(s.id.clone());
                }
            }
            if s.is_btst && s.status.is_open() {
                out.btst_update = true;
            }
        }

        if !diff.is_empty() {
            out.diffs.insert(s.id.clone(), diff);
        }
    }

    for w in incoming_watchlist {
        let changed = match previous_watchlist.iter().find(|o| o.symbol == w.symbol) {
            None => true,
            Some(old) => w.price != old.price,
        };
        if changed {
            out.watchlist_changed = true;
            out.changed_symbols.push(w.symbol.clone());
        }
    }

    if let Some(latest) = &out.latest_intel_id {
        if previous_intel_id != Some(latest.as_str()) {
            out.intel_changed = true;
        }
    }

    out.signals = incoming_signals;
    out
}
