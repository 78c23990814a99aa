//! ---
//! sfo_section: "01-core-functionality"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "Shared primitives and utilities for the failover runtime."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
use std::time::Duration;

/// Convert a duration into fractional milliseconds rounded to two decimals.
pub fn duration_to_millis(duration: Duration) -> f64 {
    let millis = duration.as_secs_f64() * 1_000.0;
    (millis * 100.0).round() / 100.0
}

/// Render a duration for operator-facing messages (`250ms`, `1.5s`).
pub fn human_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        let secs = duration.as_secs_f64();
        if secs.fract() == 0.0 {
            format!("{}s", secs as u64)
        } else {
            format!("{:.1}s", secs)
        }
    }
}
