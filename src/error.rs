use thiserror::Error;

/// Failures talking to the spreadsheet endpoint.
///
/// None of these are fatal: a failed fetch only lights the connection
/// indicator and the next scheduled poll tries again.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("terminal access denied, verify script deployment permissions")]
    AccessDenied,

    #[error("JSON structure corrupted")]
    Corrupted,

    #[error("invalid terminal response format")]
    InvalidFormat,

    #[error("failed to encode write payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no snapshot available")]
    Exhausted,
}

/// Login refusals. The display text is what the subscriber sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Enter 10-digit mobile number.")]
    InvalidPhone,

    #[error("Access key required.")]
    MissingPassword,

    #[error("Authorized subscriber not found.")]
    SubscriberNotFound,

    #[error("Invalid Access Key.")]
    InvalidAccessKey,

    #[error("ACCESS EXPIRED. CONTACT ADMIN FOR RENEWAL.")]
    Expired,

    #[error("SECURITY POLICY: NEW ACCESS KEY REQUIRED FOR RE-ACTIVATION.")]
    RotationRequired,

    #[error("SECURITY VIOLATION: This account is locked to another terminal. Contact Admin to reset.")]
    DeviceLocked,

    #[error("Terminal handshake failed. Try again.")]
    HandshakeFailed,

    #[error("Server synchronization failed. Check connection.")]
    SyncFailed,
}

/// Rejected `field=value` signal edits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("nothing to change")]
    Empty,

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("bad value `{value}` for {field}")]
    BadValue { field: String, value: String },
}
