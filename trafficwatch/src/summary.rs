//! Periodic traffic summaries for the log

use std::time::{Duration, SystemTime};

use traffic_buffer::{average_throughput, peak_throughput, throughput, window, KeyRecord, TrafficStats};

/// Format a byte rate for display
pub fn format_rate(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// One summary line for a port
///
/// Rates cover the entries captured within `span` of `now`.
pub fn summarize(
    name: &str,
    record: &KeyRecord<TrafficStats>,
    now: SystemTime,
    span: Duration,
) -> String {
    let Some(current) = record.current() else {
        return format!("{}: no samples yet", name);
    };

    let since = now.checked_sub(span).unwrap_or(SystemTime::UNIX_EPOCH);
    let recent = window(record.history(), since);
    let points = throughput(recent);
    let (avg_sent, avg_recv) = average_throughput(&points);
    let (peak_sent, peak_recv) = peak_throughput(&points);

    format!(
        "{}: {} conn, {} samples, out {} (peak {}), in {} (peak {})",
        name,
        current.connections,
        record.len(),
        format_rate(avg_sent),
        format_rate(peak_sent),
        format_rate(avg_recv),
        format_rate(peak_recv),
    )
}
