use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notify::{Notifier, TonePattern};

/// Rings the terminal bell once per pulse.
pub struct TerminalBell {
    enabled: AtomicBool,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalBell {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            current: Mutex::new(None),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.stop();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn ring() {
        let mut err = std::io::stderr();
        if let Err(e) = err.write_all(b"\x07").and_then(|_| err.flush()) {
            debug!("Bell write failed: {}", e);
        }
    }
}

impl Notifier for TerminalBell {
    fn play(&self, pattern: &TonePattern) {
        if !self.is_enabled() {
            return;
        }
        self.stop();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime for alert tone, ringing once");
            Self::ring();
            return;
        };

        let mut steps = pattern.steps.clone();
        steps.sort_by_key(|s| s.start_ms);
        let auto_stop = pattern.auto_stop_ms;
        let kind = pattern.kind;

        let task = handle.spawn(async move {
            let pulses = async {
                let mut elapsed = 0;
                for step in steps {
                    if step.start_ms > elapsed {
                        tokio::time::sleep(Duration::from_millis(step.start_ms - elapsed)).await;
                        elapsed = step.start_ms;
                    }
                    debug!("Tone {} {:.0}Hz {:?}", kind, step.freq_hz, step.waveform);
                    Self::ring();
                }
            };
            match auto_stop {
                Some(ms) => {
                    let _ = tokio::time::timeout(Duration::from_millis(ms), pulses).await;
                }
                None => pulses.await,
            }
        });

        if let Ok(mut current) = self.current.lock() {
            *current = Some(task);
        }
    }

    fn stop(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(task) = current.take() {
                task.abort();
            }
        }
    }
}

impl Drop for TerminalBell {
    fn drop(&mut self) {
        self.stop();
    }
}
