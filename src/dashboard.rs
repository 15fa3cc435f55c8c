use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use libra_terminal::admin::{AdminConsole, SignalEdit};
use libra_terminal::config::Config;
use libra_terminal::engine::{latest_admin_message, Alert, SyncOutcome, Terminal};
use libra_terminal::models::{dashboard_order, ConnectionStatus, User};

/// A line typed into the running terminal.
#[derive(Debug, PartialEq)]
enum Command {
    /// Blank line or `sync`: the operator is back, refresh now.
    Resync,
    Edit { id: String, edit: SignalEdit },
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("sync") {
        return Ok(Command::Resync);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match word.to_lowercase().as_str() {
        "edit" => {
            let rest = rest.trim_start();
            let (id, fields) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if id.is_empty() {
                return Err("usage: edit <signal-id> field=value ...".to_string());
            }
            let edit = SignalEdit::parse(fields).map_err(|e| format!("edit {}: {}", id, e))?;
            Ok(Command::Edit {
                id: id.to_string(),
                edit,
            })
        }
        other => Err(format!("unknown command `{}`", other)),
    }
}

pub struct Dashboard {
    config: Config,
    terminal: Arc<Terminal>,
    user: User,
    last_status: ConnectionStatus,
}

impl Dashboard {
    pub fn new(config: Config, terminal: Arc<Terminal>, user: User) -> Self {
        info!("{}", "=".repeat(60));
        info!("Libra terminal starting up");
        info!(
            "Subscriber: {}{}",
            user.name,
            if user.is_admin { " (admin)" } else { "" }
        );
        info!("Expiry: {}", user.expiry_date);
        info!("Poll interval: {}s", config.poll_interval_secs);
        info!("{}", "=".repeat(60));

        Self {
            config,
            terminal,
            user,
            last_status: ConnectionStatus::Syncing,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Terminal is live. Press Enter to resync, Ctrl+C to stop.");
        if self.user.is_admin {
            info!("Admin: edit <signal-id> status=.. sl=.. tsl=.. targets=a,b hit=.. qty=.. comment=..");
        }

        let input = BufReader::new(tokio::io::stdin());
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl+C handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(input, ctrl_c).await
    }

    /// Poll, sweep and read commands until `shutdown` resolves. Syncs run
    /// as their own tasks; the terminal drops overlapping ones.
    async fn run_until<R, S>(&mut self, input: R, shutdown: S) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.terminal.sync(true).await;
        self.last_status = self.terminal.status().await;
        self.print_board(None).await;

        let mut poll = tokio::time::interval(self.config.poll_interval());
        let mut sweep = tokio::time::interval(self.config.sweep_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Both intervals fire immediately; the initial sync already ran.
        poll.tick().await;
        sweep.tick().await;

        let (tx, mut outcomes) = mpsc::unbounded_channel();
        let mut lines = input.lines();
        let mut input_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    self.shutdown().await;
                    return Ok(());
                }
                _ = poll.tick() => {
                    self.spawn_sync(&tx);
                }
                _ = sweep.tick() => {
                    let report = self.terminal.sweep().await;
                    if report.intel_cleared {
                        debug!("Intel banner cleared");
                    }
                }
                Some(outcome) = outcomes.recv() => {
                    self.report(outcome).await;
                }
                line = lines.next_line(), if input_open => {
                    match line {
                        Ok(Some(line)) => self.handle_line(&line, &tx).await,
                        Ok(None) => input_open = false,
                        Err(e) => {
                            debug!("stdin closed: {}", e);
                            input_open = false;
                        }
                    }
                }
            }
        }
    }

    fn spawn_sync(&self, tx: &UnboundedSender<SyncOutcome>) {
        let terminal = self.terminal.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(terminal.sync(false).await);
        });
    }

    async fn handle_line(&self, line: &str, tx: &UnboundedSender<SyncOutcome>) {
        match parse_command(line) {
            Ok(Command::Resync) => {
                info!("Focus regained, resyncing");
                self.spawn_sync(tx);
            }
            Ok(Command::Edit { id, edit }) => self.spawn_edit(&id, edit, tx).await,
            Err(msg) => warn!("{}", msg),
        }
    }

    async fn spawn_edit(&self, id: &str, edit: SignalEdit, tx: &UnboundedSender<SyncOutcome>) {
        if !self.user.is_admin {
            warn!("Signal edits need an administrator session");
            return;
        }
        let state = self.terminal.state().await;
        let Some(signal) = state.signals.iter().find(|s| s.id == id).cloned() else {
            warn!("No signal {} on the board", id);
            return;
        };

        let console = AdminConsole::new(self.terminal.clone());
        let tx = tx.clone();
        tokio::spawn(async move {
            match console.edit_signal(&signal, &edit).await {
                Ok(outcome) => {
                    let _ = tx.send(outcome);
                }
                Err(e) => warn!("Edit of {} failed: {}", signal.id, e),
            }
        });
    }

    async fn report(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Applied(Some(alert)) => self.print_board(Some(&alert)).await,
            SyncOutcome::Applied(None) => {
                if self.last_status != ConnectionStatus::Connected {
                    info!("Connection restored");
                }
            }
            SyncOutcome::Failed => {
                if self.last_status != ConnectionStatus::Error {
                    warn!("Sheet unreachable, showing last known state");
                }
            }
            SyncOutcome::Skipped => debug!("Poll skipped, previous sync still running"),
        }
        self.last_status = self.terminal.status().await;
    }

    async fn print_board(&self, alert: Option<&Alert>) {
        let state = self.terminal.state().await;
        let alerts = self.terminal.alerts().await;

        if let Some(alert) = alert {
            info!("*** {} ALERT ***", alert.kind.to_string().to_uppercase());
        }
        info!(
            "Status: {} | Last sync: {} IST",
            state.status,
            state.last_sync.as_deref().unwrap_or("--:--:--")
        );

        for s in dashboard_order(&state.signals) {
            let marker = if state.focus.as_deref() == Some(s.id.as_str()) {
                ">"
            } else if alerts.major_expiry(&s.id).is_some() {
                "*"
            } else {
                " "
            };
            let changed = alerts
                .highlight(&s.id)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|f| f.as_str())
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();
            let targets: Vec<String> = s.targets.iter().map(|t| t.to_string()).collect();
            info!(
                "{} {:<10} {:<28} {:<4} entry={} sl={} tgt=[{}] hit={} {}{}{}",
                marker,
                s.id,
                s.label(),
                s.action,
                s.entry_price,
                s.trailing_sl.unwrap_or(s.stop_loss),
                targets.join(" "),
                s.targets_hit,
                s.status,
                if s.is_btst { " BTST" } else { "" },
                if changed.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", changed)
                }
            );
        }

        for w in &state.watchlist {
            let moved = if alerts.watchlist_expiry(&w.symbol).is_some() {
                "*"
            } else {
                " "
            };
            info!(
                "{} {:<12} {:>10.2} {:+.2}",
                moved, w.symbol, w.price, w.change
            );
        }

        for insight in &state.insights {
            info!("  {}", insight);
        }

        if alerts.intel_until().is_some() {
            if let Some(m) = latest_admin_message(&state.messages) {
                if m.broadcaster.is_empty() {
                    info!("INTEL: {}", m.text);
                } else {
                    info!("INTEL ({}): {}", m.broadcaster, m.text);
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down...");
        self.terminal.stop_alert();
        self.print_board(None).await;
        info!("Session for {} left open until it expires.", self.user.name);
        info!("Terminal stopped.");
    }
}
