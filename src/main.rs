mod dashboard;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use libra_terminal::auth::{self, device_fingerprint};
use libra_terminal::config::Config;
use libra_terminal::engine::{SystemClock, Terminal};
use libra_terminal::notify::TerminalBell;
use libra_terminal::session::{Preferences, SessionStore};
use libra_terminal::sheet::{DataSource, SheetClient};

use crate::dashboard::Dashboard;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let source: Arc<dyn DataSource> = Arc::new(SheetClient::new(&cfg));
    let device_id = cfg.device_id.clone().unwrap_or_else(device_fingerprint);
    let sessions = SessionStore::new(&cfg);
    let now = Utc::now();

    let user = match sessions.restore(now.timestamp_millis()) {
        Some(user) => user,
        None => {
            let phone = std::env::var("LIBRA_PHONE")
                .context("no saved session: set LIBRA_PHONE and LIBRA_PASSWORD to log in")?;
            let password = std::env::var("LIBRA_PASSWORD").unwrap_or_default();
            let user = auth::login(source.as_ref(), &phone, &password, &device_id, now).await?;
            sessions.save(&user, now.timestamp_millis());
            info!("Logged in as {} on {}", user.name, device_id);
            user
        }
    };

    let prefs_path = cfg.preferences_file();
    let mut prefs = Preferences::load(&prefs_path);
    if !prefs.risk_accepted {
        if std::env::var("LIBRA_ACCEPT_RISK").as_deref() != Ok("true") {
            bail!("risk disclosure not accepted: set LIBRA_ACCEPT_RISK=true to acknowledge");
        }
        prefs.risk_accepted = true;
        prefs.save(&prefs_path);
    }
    if let Ok(sound) = std::env::var("LIBRA_SOUND") {
        prefs.sound_enabled = sound.trim().eq_ignore_ascii_case("true");
        prefs.save(&prefs_path);
    }

    let bell = Arc::new(TerminalBell::new(prefs.sound_enabled));
    let terminal = Arc::new(Terminal::new(&cfg, source, bell, Arc::new(SystemClock)));

    let mut dashboard = Dashboard::new(cfg, terminal, user);
    dashboard.run().await?;

    Ok(())
}
