use chrono::DateTime;
use chrono_tz::Asia::Kolkata;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::alerts::{classify, Alert, AlertKind};
use crate::engine::clock::Clock;
use crate::engine::dead_signals::DeadSignalRegistry;
use crate::engine::expiry::{AlertStore, SweepReport};
use crate::engine::reconciler::{reconcile, ReconcileInput};
use crate::error::SheetError;
use crate::models::{
    ChatMessage, ConnectionStatus, InsightData, LogEntry, Signal, User, WatchlistItem,
};
use crate::notify::{Notifier, TonePattern};
use crate::sheet::{DataSource, SheetSnapshot, WriteRequest};

/// Everything the dashboard renders, as of the last good poll.
#[derive(Debug, Clone, Default)]
pub struct TerminalState {
    pub signals: Vec<Signal>,
    pub history: Vec<Signal>,
    pub watchlist: Vec<WatchlistItem>,
    pub users: Vec<User>,
    pub logs: Vec<LogEntry>,
    pub messages: Vec<ChatMessage>,
    pub insights: Vec<InsightData>,
    pub status: ConnectionStatus,
    /// IST wall time of the last successful sync, `HH:MM:SS`.
    pub last_sync: Option<String>,
    /// Signal the last alert asked to bring into view.
    pub focus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied(Option<Alert>),
    Failed,
    /// Another sync was already in flight.
    Skipped,
}

struct Engine {
    view: TerminalState,
    registry: DeadSignalRegistry,
    alerts: AlertStore,
    intel_id: Option<String>,
    baseline: bool,
}

impl Engine {
    fn commit(&mut self, snapshot: SheetSnapshot, is_initial: bool, now: i64) -> Option<Alert> {
        let SheetSnapshot {
            signals,
            history,
            watchlist,
            users,
            logs,
            messages,
            insights,
        } = snapshot;

        // Nothing to compare against until one poll has been accepted.
        let is_initial = is_initial || !self.baseline;
        let guarded = self.registry.guard(signals);

        let r = reconcile(ReconcileInput {
            incoming_signals: guarded,
            previous_signals: &self.view.signals,
            incoming_watchlist: &watchlist,
            previous_watchlist: &self.view.watchlist,
            incoming_messages: &messages,
            previous_intel_id: self.intel_id.as_deref(),
            is_initial,
        });

        let alert = if is_initial { None } else { classify(&r) };
        self.alerts.apply(&r, now);
        if matches!(&alert, Some(a) if a.kind == AlertKind::Intel) {
            self.alerts.mark_intel(now);
        }
        if r.latest_intel_id.is_some() {
            self.intel_id = r.latest_intel_id.clone();
        }

        self.view.signals = r.signals;
        self.view.history = history;
        self.view.watchlist = watchlist;
        self.view.users = users;
        self.view.logs = logs;
        self.view.messages = messages;
        self.view.insights = insights;
        self.view.status = ConnectionStatus::Connected;
        self.view.last_sync = ist_clock(now);
        if let Some(focus) = alert.as_ref().and_then(|a| a.focus.clone()) {
            self.view.focus = Some(focus);
        }
        self.baseline = true;
        alert
    }
}

fn ist_clock(now_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(now_ms)
        .map(|t| t.with_timezone(&Kolkata).format("%H:%M:%S").to_string())
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Polls the sheet and turns each snapshot into committed state plus at
/// most one alert.
pub struct Terminal {
    source: Arc<dyn DataSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    major_alert_ms: i64,
    in_flight: AtomicBool,
    engine: Mutex<Engine>,
}

impl Terminal {
    pub fn new(
        cfg: &Config,
        source: Arc<dyn DataSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            notifier,
            clock,
            major_alert_ms: cfg.major_alert_ms,
            in_flight: AtomicBool::new(false),
            engine: Mutex::new(Engine {
                view: TerminalState::default(),
                registry: DeadSignalRegistry::new(),
                alerts: AlertStore::new(cfg.major_alert_ms, cfg.intel_alert_ms),
                intel_id: None,
                baseline: false,
            }),
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Fetch and apply one snapshot. Failures only show up as
    /// `ConnectionStatus::Error`; the previous state stays on screen.
    pub async fn sync(&self, is_initial: bool) -> SyncOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync already in flight, dropping request");
            return SyncOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        self.engine.lock().await.view.status = ConnectionStatus::Syncing;

        let snapshot = match self.source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Sync failed: {}", e);
                self.engine.lock().await.view.status = ConnectionStatus::Error;
                return SyncOutcome::Failed;
            }
        };

        let now = self.clock.now_ms();
        let alert = {
            let mut engine = self.engine.lock().await;
            let alert = engine.commit(snapshot, is_initial, now);
            debug!(
                "Synced {} signals, {} watchlist, {} pinned",
                engine.view.signals.len(),
                engine.view.watchlist.len(),
                engine.registry.len()
            );
            alert
        };

        if let Some(alert) = &alert {
            match &alert.focus {
                Some(id) => info!("Alert: {} (focus {})", alert.kind, id),
                None => info!("Alert: {}", alert.kind),
            }
            self.notifier
                .play(&TonePattern::for_alert(alert.kind, self.major_alert_ms));
        }
        SyncOutcome::Applied(alert)
    }

    /// Forget pinned signals and reload as a silent baseline.
    pub async fn hard_resync(&self) -> SyncOutcome {
        {
            let mut engine = self.engine.lock().await;
            info!("Hard resync, dropping {} pinned signals", engine.registry.len());
            engine.registry.clear();
        }
        self.sync(true).await
    }

    /// Write an edited signal back to the sheet. A closing edit is pinned
    /// so the next poll cannot undo it before the sheet catches up.
    pub async fn update_signal(&self, signal: &Signal) -> Result<SyncOutcome, SheetError> {
        let request = WriteRequest::update_signal(signal)?;
        self.source.write(&request).await?;
        info!("Updated {} -> {}", signal.label(), signal.status);

        if signal.is_closed() {
            self.engine.lock().await.registry.pin(signal);
        }
        Ok(self.sync(false).await)
    }

    /// Drop expired alert windows.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now_ms();
        let report = self.engine.lock().await.alerts.sweep(now);
        if !report.is_empty() {
            debug!(
                "Expired {} signal alerts, {} watchlist alerts",
                report.signals.len(),
                report.symbols.len()
            );
        }
        report
    }

    pub fn stop_alert(&self) {
        self.notifier.stop();
    }

    pub async fn state(&self) -> TerminalState {
        self.engine.lock().await.view.clone()
    }

    pub async fn alerts(&self) -> AlertStore {
        self.engine.lock().await.alerts.clone()
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.engine.lock().await.view.status
    }

    pub async fn is_pinned(&self, id: &str) -> bool {
        self.engine.lock().await.registry.contains(id)
    }
}
