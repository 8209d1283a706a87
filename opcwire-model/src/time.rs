//! OPC-UA timestamps: signed 100 ns ticks since 1601-01-01 UTC.

use chrono::{DateTime, TimeZone, Utc};

/// Seconds between 1601-01-01 and the Unix epoch.
pub const EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

const TICKS_PER_SEC: i64 = 10_000_000;

/// Converts a wire timestamp. Returns `None` when the instant is outside the
/// range chrono can represent.
pub fn from_opc_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let secs = ticks.div_euclid(TICKS_PER_SEC) - EPOCH_OFFSET_SECS;
    let nanos = ticks.rem_euclid(TICKS_PER_SEC) as u32 * 100;
    Utc.timestamp_opt(secs, nanos).single()
}

/// Converts to a wire timestamp, truncating below 100 ns. Returns `None` on
/// overflow.
pub fn to_opc_ticks(time: &DateTime<Utc>) -> Option<i64> {
    let secs = time.timestamp().checked_add(EPOCH_OFFSET_SECS)?;
    secs.checked_mul(TICKS_PER_SEC)?
        .checked_add(i64::from(time.timestamp_subsec_nanos() / 100))
}
