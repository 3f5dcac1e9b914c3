use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds since the epoch; 0 if the clock is before 1970.
pub fn current_unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
