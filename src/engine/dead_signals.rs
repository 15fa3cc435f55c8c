use std::collections::HashMap;
use tracing::debug;

use crate::models::Signal;

/// Closed signals pinned for the rest of the session.
///
/// The sheet is edited by hand and a poll can return a stale row for a
/// signal that already closed. Once a signal is seen in a terminal status
/// its closed representation wins over whatever later polls say; only the
/// row position is refreshed so ordering keeps up with the sheet.
#[derive(Debug, Default, Clone)]
pub struct DeadSignalRegistry {
    closed: HashMap<String, Signal>,
}

impl DeadSignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.closed.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Signal> {
        self.closed.get(id)
    }

    pub fn len(&self) -> usize {
        self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closed.is_empty()
    }

    /// Pin `signal` if it is closed and not pinned yet. Returns true when
    /// it was newly registered.
    pub fn record_closed(&mut self, signal: &Signal) -> bool {
        if !signal.is_closed() || self.closed.contains_key(&signal.id) {
            return false;
        }
        debug!("Pinning closed signal {} ({})", signal.id, signal.status);
        self.closed.insert(signal.id.clone(), signal.clone());
        true
    }

    /// Pin an administrator's own closing edit, replacing any earlier pin.
    pub fn pin(&mut self, signal: &Signal) {
        if signal.is_closed() {
            self.closed.insert(signal.id.clone(), signal.clone());
        }
    }

    /// Substitute pinned snapshots into an incoming poll, then pin any
    /// signal seen closed for the first time exactly as it arrived.
    pub fn guard(&mut self, incoming: Vec<Signal>) -> Vec<Signal> {
        incoming
            .into_iter()
            .map(|s| {
                if let Some(pinned) = self.closed.get(&s.id) {
                    let mut merged = pinned.clone();
                    merged.sheet_index = s.sheet_index;
                    return merged;
                }
                self.record_closed(&s);
                s
            })
            .collect()
    }

    /// Only an administrator hard resync forgets pinned signals.
    pub fn clear(&mut self) {
        self.closed.clear();
    }
}
