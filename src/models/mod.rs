pub mod market;
pub mod signal;
pub mod status;

pub use market::{ChatMessage, InsightData, LogEntry, User, WatchlistItem};
pub use signal::{dashboard_order, Signal, SignalField};
pub use status::*;
