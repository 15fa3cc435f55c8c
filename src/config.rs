use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const SCRIPT_URL: &str = "https://script.google.com/macros/s/AKfycbzsGgTmJET-j414jqdLl3mQSy0Rm444KOWORIUAnsZHB2SFZVJKuAeHIeoMA-dDEyef/exec";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data source
    pub script_url: String,
    pub fetch_retries: u32,
    pub retry_delay_ms: u64,

    // Polling
    pub poll_interval_secs: u64,
    pub sweep_interval_ms: u64,

    // Alert windows
    pub major_alert_ms: i64,
    pub intel_alert_ms: i64,

    // Session
    pub session_duration_hours: i64,
    pub state_dir: String,
    pub device_id: Option<String>,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Config {
            script_url: env("LIBRA_SCRIPT_URL", SCRIPT_URL).trim().to_string(),
            fetch_retries: env("FETCH_RETRIES", "3").parse().unwrap_or(3),
            retry_delay_ms: env("RETRY_DELAY_MS", "1500").parse().unwrap_or(1500),
            poll_interval_secs: env("POLL_INTERVAL_SECS", "8").parse().unwrap_or(8),
            sweep_interval_ms: 1000,
            major_alert_ms: env("MAJOR_ALERT_MS", "15000").parse().unwrap_or(15_000),
            intel_alert_ms: env("INTEL_ALERT_MS", "60000").parse().unwrap_or(60_000),
            session_duration_hours: 8,
            state_dir: env("LIBRA_STATE_DIR", ".libra"),
            device_id: std::env::var("LIBRA_DEVICE_ID")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            log_level: env("LOG_LEVEL", "info"),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn session_file(&self) -> PathBuf {
        PathBuf::from(&self.state_dir).join("session.json")
    }

    pub fn preferences_file(&self) -> PathBuf {
        PathBuf::from(&self.state_dir).join("preferences.json")
    }
}
