//! Wall-clock helper shared by producers of delivery timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as seconds since the UNIX epoch.
///
/// This is the clock frame events are stamped with on arrival; trigger
/// packets carry the external time reference in the same unit so the two
/// are directly comparable.
pub fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
