//! Lifecycle status derivation.
//!
//! Status is never stored. A key's `expires_at` alone encodes it:
//! no expiry means the key is subscribed and permanently active, a future
//! date means active-with-expiry, "today" (or yesterday, to tolerate a
//! disable that ran just before a day rollover) means administratively
//! disabled, and anything older means expired.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

const SECONDS_PER_DAY: i64 = 86400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Disabled,
    Expired,
}

/// Truncate a Unix timestamp to the start of its UTC calendar day.
pub fn utc_day_start(ts: i64) -> i64 {
    ts.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY
}

/// Whole UTC calendar days between two timestamps (day(b) - day(a)).
fn days_between(a: i64, b: i64) -> i64 {
    b.div_euclid(SECONDS_PER_DAY) - a.div_euclid(SECONDS_PER_DAY)
}

/// Derive a key's status from its expiry at UTC day granularity.
///
/// Pure and deterministic; `now` is always passed explicitly so callers
/// (and tests) control the clock. Comparison is on UTC calendar days, never
/// wall-clock time, so results don't drift across server timezones.
pub fn derive_status(expires_at: Option<i64>, now: i64) -> KeyStatus {
    let Some(expires_at) = expires_at else {
        return KeyStatus::Active;
    };

    let days_diff = days_between(now, expires_at);
    if days_diff > 0 {
        KeyStatus::Active
    } else if days_diff >= -1 {
        // Expiry set to "today" is the disable marker; -1 tolerates a
        // disable that landed just before the UTC day ticked over.
        KeyStatus::Disabled
    } else {
        KeyStatus::Expired
    }
}
