use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::SheetError;
use crate::sheet::{DataSource, SheetSnapshot, WriteRequest};

/// A DataSource that replays queued snapshots instead of calling the sheet.
/// Each fetch pops the next entry (`None` = failed fetch); once the queue is
/// drained the last good snapshot keeps being served. Writes are recorded.
pub struct ScriptedSource {
    queue: Mutex<VecDeque<Option<SheetSnapshot>>>,
    last: Mutex<Option<SheetSnapshot>>,
    writes: Mutex<Vec<WriteRequest>>,
    fetch_delay: Option<Duration>,
    fail_writes: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            fetch_delay: None,
            fail_writes: false,
        }
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn push(&self, snapshot: SheetSnapshot) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Some(snapshot));
        }
    }

    pub fn push_failure(&self) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(None);
        }
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<SheetSnapshot, SheetError> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let mut last = self.last.lock().map_err(|_| SheetError::Exhausted)?;
        match next {
            Some(Some(snapshot)) => {
                *last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(None) => Err(SheetError::Status(503)),
            None => last.clone().ok_or(SheetError::Exhausted),
        }
    }

    async fn write(&self, request: &WriteRequest) -> Result<(), SheetError> {
        if self.fail_writes {
            return Err(SheetError::Status(500));
        }
        if let Ok(mut w) = self.writes.lock() {
            w.push(request.clone());
        }
        Ok(())
    }
}
