use std::sync::Mutex;

use crate::engine::AlertKind;
use crate::notify::{Notifier, TonePattern};

/// Notifier that only remembers what it was asked to play.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    played: Mutex<Vec<AlertKind>>,
    stops: Mutex<usize>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<AlertKind> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn stops(&self) -> usize {
        self.stops.lock().map(|s| *s).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut played) = self.played.lock() {
            played.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn play(&self, pattern: &TonePattern) {
        if let Ok(mut played) = self.played.lock() {
            played.push(pattern.kind);
        }
    }

    fn stop(&self) {
        if let Ok(mut stops) = self.stops.lock() {
            *stops += 1;
        }
    }
}
