use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::reconciler::Reconciliation;

/// Severity of the one alert a poll may raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Routine signal update.
    Major,
    /// A signal reached STOPPED, EXITED or ALL_TARGET.
    Critical,
    /// An overnight-carry signal changed and is still open.
    Btst,
    Intel,
    Watchlist,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Major => write!(f, "major"),
            AlertKind::Critical => write!(f, "critical"),
            AlertKind::Btst => write!(f, "btst"),
            AlertKind::Intel => write!(f, "intel"),
            AlertKind::Watchlist => write!(f, "watchlist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    /// Signal to bring into view, for signal alerts.
    pub focus: Option<String>,
}

/// Pick the single alert for a poll: signal changes beat intel, intel
/// beats watchlist moves.
pub fn classify(r: &Reconciliation) -> Option<Alert> {
    if r.signal_changed {
        let kind = if r.btst_update {
            AlertKind::Btst
        } else if r.critical {
            AlertKind::Critical
        } else {
            AlertKind::Major
        };
        return Some(Alert {
            kind,
            focus: r.focus.clone(),
        });
    }
    if r.intel_changed {
        return Some(Alert {
            kind: AlertKind::Intel,
            focus: None,
        });
    }
    if r.watchlist_changed {
        return Some(Alert {
            kind: AlertKind::Watchlist,
            focus: None,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_beats_intel_and_watchlist() {
        let r = Reconciliation {
            signal_changed: true,
            intel_changed: true,
            watchlist_changed: true,
            focus: Some("A".to_string()),
            ..Default::default()
        };
        let alert = classify(&r).unwrap();
        assert_eq!(alert.kind, AlertKind::Major);
        assert_eq!(alert.focus.as_deref(), Some("A"));
    }

    #[test]
    fn intel_beats_watchlist() {
        let r = Reconciliation {
            intel_changed: true,
            watchlist_changed: true,
            ..Default::default()
        };
        assert_eq!(classify(&r).unwrap().kind, AlertKind::Intel);
    }

    #[test]
    fn tone_severity() {
        let critical = Reconciliation {
            signal_changed: true,
            critical: true,
            ..Default::default()
        };
        assert_eq!(classify(&critical).unwrap().kind, AlertKind::Critical);

        let both = Reconciliation {
            signal_changed: true,
            critical: true,
            btst_update: true,
            ..Default::default()
        };
        assert_eq!(classify(&both).unwrap().kind, AlertKind::Btst);
    }

    #[test]
    fn quiet_poll_has_no_alert() {
        assert!(classify(&Reconciliation::default()).is_none());
    }
}
