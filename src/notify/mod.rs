pub mod bell;
pub mod recording;

pub use bell::TerminalBell;
pub use recording::RecordingNotifier;

use crate::engine::AlertKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

/// One pulse, offset from the start of its pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneStep {
    pub freq_hz: f32,
    pub waveform: Waveform,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TonePattern {
    pub kind: AlertKind,
    pub steps: Vec<ToneStep>,
    /// Silence the pattern after this long even if pulses remain.
    pub auto_stop_ms: Option<u64>,
}

impl TonePattern {
    pub fn for_alert(kind: AlertKind, major_alert_ms: i64) -> Self {
        match kind {
            AlertKind::Major => Self::long_beep(kind, 880.0, Waveform::Sine, major_alert_ms),
            AlertKind::Critical => Self::long_beep(kind, 440.0, Waveform::Square, major_alert_ms),
            AlertKind::Btst => Self::long_beep(kind, 980.0, Waveform::Square, major_alert_ms),
            AlertKind::Intel => Self {
                kind,
                steps: [0, 600, 1200]
                    .into_iter()
                    .map(|start_ms| ToneStep {
                        freq_hz: 1200.0,
                        waveform: Waveform::Sine,
                        start_ms,
                        duration_ms: 400,
                        gain: 0.2,
                    })
                    .collect(),
                auto_stop_ms: None,
            },
            AlertKind::Watchlist => Self {
                kind,
                steps: vec![
                    ToneStep {
                        freq_hz: 2200.0,
                        waveform: Waveform::Sine,
                        start_ms: 0,
                        duration_ms: 80,
                        gain: 0.4,
                    },
                    ToneStep {
                        freq_hz: 1800.0,
                        waveform: Waveform::Sine,
                        start_ms: 60,
                        duration_ms: 120,
                        gain: 0.4,
                    },
                ],
                auto_stop_ms: None,
            },
        }
    }

    // Two 2 s pulses, 5 s apart.
    fn long_beep(kind: AlertKind, freq_hz: f32, waveform: Waveform, major_alert_ms: i64) -> Self {
        let steps = [0, 5000]
            .into_iter()
            .map(|start_ms| ToneStep {
                freq_hz,
                waveform,
                start_ms,
                duration_ms: 2000,
                gain: 0.15,
            })
            .collect();
        Self {
            kind,
            steps,
            auto_stop_ms: u64::try_from(major_alert_ms).ok(),
        }
    }

    /// Time until the last pulse ends.
    pub fn span_ms(&self) -> u64 {
        self.steps
            .iter()
            .map(|s| s.start_ms + s.duration_ms)
            .max()
            .unwrap_or(0)
    }
}

/// Audio side of an alert. Playing a new pattern replaces the current one.
pub trait Notifier: Send + Sync {
    fn play(&self, pattern: &TonePattern);
    fn stop(&self);
}
