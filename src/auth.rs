//! Subscriber login gate.
//!
//! Credentials are checked against the users tab of a fresh snapshot. A
//! non-admin account is bound to the first device it logs in from; after
//! an administrator clears that binding the subscriber must be issued a
//! new access key before binding again.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;
use chrono_tz::Tz;
use serde_json::json;
use tracing::{info, warn};

use crate::error::AuthError;
use crate::models::{LogEntry, LogKind, User};
use crate::sheet::{DataSource, WriteRequest};

/// Last ten digits of a phone number, ignoring formatting.
pub fn clean_phone(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(10);
    digits[start..].iter().collect()
}

pub fn is_perpetual(expiry: &str) -> bool {
    let e = expiry.trim().to_lowercase();
    e == "perpetual" || e == "admin"
}

/// Last instant of the expiry day in IST. Accepts `YYYY-MM-DD` and the
/// day-first `DD-MM-YYYY` / `DD/MM/YYYY` forms.
pub fn expiry_deadline(expiry: &str) -> Option<DateTime<Tz>> {
    let raw = expiry.trim();
    let parts: Vec<&str> = raw.split(|c| c == '-' || c == '/').collect();
    let iso = if parts.len() == 3 && parts[0].len() == 2 {
        format!("{}-{}-{}", parts[2], parts[1], parts[0])
    } else {
        parts.join("-")
    };
    let date = NaiveDate::parse_from_str(&iso, "%Y-%m-%d").ok()?;
    let end = date.and_hms_milli_opt(23, 59, 59, 999)?;
    Kolkata.from_local_datetime(&end).single()
}

/// Admins and perpetual plans never lapse; an unreadable date counts as
/// lapsed.
pub fn subscription_active(user: &User, now: DateTime<Utc>) -> bool {
    if user.is_admin || is_perpetual(&user.expiry_date) {
        return true;
    }
    match expiry_deadline(&user.expiry_date) {
        Some(deadline) => now <= deadline,
        None => false,
    }
}

pub fn device_unbound(device_id: Option<&str>) -> bool {
    match device_id.map(str::trim) {
        None => true,
        Some(id) => id.is_empty() || id == "null" || id == "undefined",
    }
}

/// Stable identifier for this machine: `LQN-` followed by a base-36 hash
/// of host characteristics.
pub fn device_fingerprint() -> String {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let components = [
        std::env::var("HOSTNAME").unwrap_or_default(),
        std::env::var("USER").unwrap_or_default(),
        std::env::consts::OS.to_string(),
        std::env::consts::ARCH.to_string(),
        cpus,
        std::env::var("LANG").unwrap_or_default(),
    ];
    fingerprint_of(&components)
}

pub fn fingerprint_of(components: &[String]) -> String {
    let joined = components.join("###");
    let mut hash: i32 = 0;
    for unit in joined.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    format!("LQN-{}", to_base36((hash as i64).unsigned_abs()))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Match credentials against the subscriber list and apply the expiry and
/// key rotation rules. No writes happen here.
pub fn authenticate<'a>(
    users: &'a [User],
    phone: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<&'a User, AuthError> {
    if phone.len() < 10 {
        return Err(AuthError::InvalidPhone);
    }
    if password.is_empty() {
        return Err(AuthError::MissingPassword);
    }

    let wanted = clean_phone(phone);
    let user = users
        .iter()
        .find(|u| clean_phone(&u.phone_number) == wanted)
        .ok_or(AuthError::SubscriberNotFound)?;

    let sheet_password = user.password.as_deref().unwrap_or("").trim();
    if password.trim() != sheet_password {
        return Err(AuthError::InvalidAccessKey);
    }

    if !subscription_active(user, now) {
        return Err(AuthError::Expired);
    }

    let last = user.last_password.as_deref().unwrap_or("").trim();
    let rotated = last != sheet_password;
    if !rotated && !last.is_empty() && device_unbound(user.device_id.as_deref()) {
        return Err(AuthError::RotationRequired);
    }

    Ok(user)
}

fn security_log(user: &User, action: &str, details: String, now: DateTime<Utc>) -> LogEntry {
    LogEntry {
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        user: user.name.clone(),
        action: action.to_string(),
        details,
        kind: LogKind::Security,
    }
}

async fn write_log(source: &dyn DataSource, entry: &LogEntry) {
    match WriteRequest::add_log(entry) {
        Ok(req) => {
            if let Err(e) = source.write(&req).await {
                warn!("Failed to write {} log: {}", entry.action, e);
            }
        }
        Err(e) => warn!("Failed to encode {} log: {}", entry.action, e),
    }
}

/// Bind or verify the device, record the grant and return the session
/// profile.
pub async fn complete_login(
    source: &dyn DataSource,
    user: &User,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<User, AuthError> {
    if !user.is_admin {
        if device_unbound(user.device_id.as_deref()) {
            let mut bound = user.clone();
            bound.device_id = Some(device_id.to_string());
            bound.last_password = user.password.clone();
            let payload = serde_json::to_value(&bound).map_err(|_| AuthError::HandshakeFailed)?;
            source
                .write(&WriteRequest::update_user(&user.id, payload))
                .await
                .map_err(|e| {
                    warn!("Device binding for {} failed: {}", user.name, e);
                    AuthError::HandshakeFailed
                })?;

            info!("Bound {} to {}", user.name, device_id);
            let entry = security_log(
                user,
                "HARDWARE_BINDING",
                format!("Locked to terminal: {}", device_id),
                now,
            );
            write_log(source, &entry).await;
        } else if user.device_id.as_deref().map(str::trim) != Some(device_id) {
            warn!("{} attempted login from unbound device {}", user.name, device_id);
            return Err(AuthError::DeviceLocked);
        }
    }

    let entry = security_log(
        user,
        "ACCESS_GRANTED",
        format!("Secure session started on {}", device_id),
        now,
    );
    write_log(source, &entry).await;

    Ok(user.public_profile(device_id))
}

/// Full login: fetch subscribers, check credentials, complete binding.
pub async fn login(
    source: &dyn DataSource,
    phone: &str,
    password: &str,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<User, AuthError> {
    if phone.len() < 10 {
        return Err(AuthError::InvalidPhone);
    }
    if password.is_empty() {
        return Err(AuthError::MissingPassword);
    }

    let snapshot = source.fetch_snapshot().await.map_err(|e| {
        warn!("Login fetch failed: {}", e);
        AuthError::SyncFailed
    })?;
    let user = authenticate(&snapshot.users, phone, password, now)?;
    complete_login(source, user, device_id, now).await
}

/// Payload for an administrator clearing a device binding.
pub fn device_reset_payload(user_id: &str) -> serde_json::Value {
    json!({ "id": user_id, "deviceId": "" })
}
