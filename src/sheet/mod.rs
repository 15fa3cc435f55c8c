pub mod client;
pub mod parse;
pub mod scripted;
pub mod write;

pub use client::SheetClient;
pub use scripted::ScriptedSource;
pub use write::{WriteAction, WriteRequest, WriteTarget};

use async_trait::async_trait;

use crate::error::SheetError;
use crate::models::{ChatMessage, InsightData, LogEntry, Signal, User, WatchlistItem};

/// Everything one GET against the sheet script returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetSnapshot {
    pub signals: Vec<Signal>,
    pub history: Vec<Signal>,
    pub watchlist: Vec<WatchlistItem>,
    pub users: Vec<User>,
    pub logs: Vec<LogEntry>,
    pub messages: Vec<ChatMessage>,
    pub insights: Vec<InsightData>,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full-state read. Implementations retry internally; an `Err` means
    /// the snapshot is unavailable for this poll.
    async fn fetch_snapshot(&self) -> Result<SheetSnapshot, SheetError>;

    /// Fire-and-forget append/update. `Ok` only means the request went out.
    async fn write(&self, request: &WriteRequest) -> Result<(), SheetError>;
}
