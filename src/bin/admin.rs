use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use libra_terminal::admin::{
    expiry_status, open_signals, search_users, sorted_logs, AdminConsole, NewSignal, SignalEdit,
    UserEdit,
};
use libra_terminal::config::Config;
use libra_terminal::engine::{SyncOutcome, SystemClock, Terminal};
use libra_terminal::models::{OptionType, TradeAction};
use libra_terminal::notify::TerminalBell;
use libra_terminal::session::SessionStore;
use libra_terminal::sheet::{DataSource, SheetClient};
use libra_terminal::stats::PerformanceReport;

const USAGE: &str = "\
usage: libra-admin <command> [args]

  signal <instrument> <symbol> <CE|PE|FUT> <BUY|SELL> <entry> [qty] [--btst] [--stock NAME]
  exit <signal-id>
  edit <signal-id> field=value... (status sl tsl targets hit qty entry comment)
  intel <text...>
  renew <user-id> <expiry>
  reset-device <user-id>
  users [query]
  logs [count]
  stats";

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let now = Utc::now();
    let operator = SessionStore::new(&cfg)
        .restore(now.timestamp_millis())
        .context("no active session: log in with libra-terminal first")?;
    if !operator.is_admin {
        bail!("{} is not an administrator", operator.name);
    }

    let source: Arc<dyn DataSource> = Arc::new(SheetClient::new(&cfg));
    let terminal = Arc::new(Terminal::new(
        &cfg,
        source,
        // One-shot commands never ring
        Arc::new(TerminalBell::new(false)),
        Arc::new(SystemClock),
    ));
    if terminal.sync(true).await == SyncOutcome::Failed {
        bail!("could not reach the sheet");
    }
    let state = terminal.state().await;

    let broadcaster = std::env::var("LIBRA_BROADCASTER").unwrap_or_default();
    let console = AdminConsole::new(terminal.clone()).with_broadcaster(&broadcaster);

    match command.as_str() {
        "signal" => {
            let signal = parse_new_signal(&args[1..])?;
            match console.add_signal(&signal, now).await? {
                Some(id) => println!("Published {}", id),
                None => println!("Symbol and entry price are required"),
            }
        }
        "exit" => {
            let id = args.get(1).context("signal id required")?;
            let signal = open_signals(&state.signals)
                .into_iter()
                .find(|s| &s.id == id)
                .with_context(|| format!("no open signal {}", id))?
                .clone();
            console.urgent_exit(&signal, now).await?;
            println!("Exit sent for {}", signal.label());
        }
        "edit" => {
            let id = args.get(1).context("signal id required")?;
            let edit = SignalEdit::parse(&args[2..].join(" "))?;
            let signal = state
                .signals
                .iter()
                .find(|s| &s.id == id)
                .with_context(|| format!("no live signal {}", id))?
                .clone();
            console.edit_signal(&signal, &edit).await?;
            println!("Updated {}", signal.label());
        }
        "intel" => {
            let text = args[1..].join(" ");
            match console.post_intel(&text, now).await? {
                Some(id) => println!("Broadcast {}", id),
                None => println!("Nothing to broadcast"),
            }
        }
        "renew" => {
            let id = args.get(1).context("user id required")?;
            let expiry = args.get(2).context("expiry date required")?;
            let edit = UserEdit {
                expiry_date: Some(expiry.clone()),
                ..Default::default()
            };
            console.update_user(id, &edit).await?;
            println!("{} renewed until {}", id, expiry);
        }
        "reset-device" => {
            let id = args.get(1).context("user id required")?;
            let user = state
                .users
                .iter()
                .find(|u| &u.id == id)
                .with_context(|| format!("no user {}", id))?;
            console.reset_device(user).await?;
            println!("Device lock cleared for {}", user.name);
        }
        "users" => {
            let query = args.get(1).map(String::as_str).unwrap_or("");
            for u in search_users(&state.users, query) {
                println!(
                    "{:<10} {:<24} {:<14} {:<12} {:<14} {}",
                    u.id,
                    u.name,
                    u.phone_number,
                    u.expiry_date,
                    expiry_status(&u.expiry_date, now),
                    u.device_id.as_deref().filter(|d| !d.is_empty()).unwrap_or("Unbound")
                );
            }
        }
        "logs" => {
            let count: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(50);
            for l in sorted_logs(&state.logs).into_iter().take(count) {
                println!("{} {:<8} {:<16} {:<20} {}", l.timestamp, l.kind, l.user, l.action, l.details);
            }
        }
        "stats" => {
            PerformanceReport::from_signals(&state.signals, &state.history, now).print_summary();
        }
        _ => {
            println!("{}", USAGE);
        }
    }

    Ok(())
}

fn parse_new_signal(args: &[String]) -> Result<NewSignal> {
    let mut positional = Vec::new();
    let mut is_btst = false;
    let mut custom_stock = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--btst" => is_btst = true,
            "--stock" => custom_stock = iter.next().cloned(),
            _ => positional.push(arg.as_str()),
        }
    }

    if positional.len() < 5 {
        bail!("signal needs <instrument> <symbol> <type> <action> <entry>");
    }
    let option_type = OptionType::parse(positional[2])
        .with_context(|| format!("unknown option type {}", positional[2]))?;
    let entry_price: f64 = positional[4]
        .parse()
        .with_context(|| format!("bad entry price {}", positional[4]))?;
    let quantity: Option<u32> = match positional.get(5) {
        Some(q) => Some(q.parse().with_context(|| format!("bad quantity {}", q))?),
        None => None,
    };

    Ok(NewSignal {
        instrument: positional[0].to_uppercase(),
        custom_stock,
        symbol: positional[1].to_string(),
        option_type,
        action: TradeAction::parse(positional[3]),
        entry_price,
        quantity,
        is_btst,
    })
}
