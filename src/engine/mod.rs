pub mod alerts;
pub mod clock;
pub mod dead_signals;
pub mod expiry;
pub mod reconciler;
pub mod terminal;

pub use alerts::{classify, Alert, AlertKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dead_signals::DeadSignalRegistry;
pub use expiry::{AlertStore, SweepReport};
pub use reconciler::{latest_admin_message, reconcile, FieldDiff, ReconcileInput, Reconciliation};
pub use terminal::{SyncOutcome, Terminal, TerminalState};
