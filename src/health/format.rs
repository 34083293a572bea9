// src/health/format.rs
// Human-readable byte counts and uptime strings for the system check.

use chrono::Duration;

const BYTE_UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Decimal (SI) byte count: one decimal place below 10, whole numbers above.
/// Rounding happens before the unit is fixed, so 999 999 bytes is "1.0 MB".
pub fn pretty_bytes(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let mut rounded = round_for_display(value);
    if rounded >= 1000.0 && unit < BYTE_UNITS.len() - 1 {
        unit += 1;
        rounded = round_for_display(value / 1000.0);
    }

    if rounded < 10.0 {
        format!("{:.1} {}", rounded, BYTE_UNITS[unit])
    } else {
        format!("{:.0} {}", rounded, BYTE_UNITS[unit])
    }
}

fn round_for_display(value: f64) -> f64 {
    let tenths = (value * 10.0).round() / 10.0;
    if tenths < 10.0 {
        tenths
    } else {
        value.round()
    }
}

/// Elapsed time as e.g. "2 days, 3 hours and 1 second". Negative durations
/// (clock skew, a start time in the future) read as zero.
pub fn format_uptime(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);

    let parts = [
        (total / 86_400, "day"),
        (total % 86_400 / 3_600, "hour"),
        (total % 3_600 / 60, "minute"),
        (total % 60, "second"),
    ];

    let words: Vec<String> = parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| {
            if *n == 1 {
                format!("{} {}", n, unit)
            } else {
                format!("{} {}s", n, unit)
            }
        })
        .collect();

    match words.split_last() {
        None => "0 seconds".to_string(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_below_a_kilobyte_are_exact() {
        assert_eq!(pretty_bytes(0), "0 B");
        assert_eq!(pretty_bytes(999), "999 B");
    }

    #[test]
    fn bytes_scale_with_si_units() {
        assert_eq!(pretty_bytes(1000), "1.0 kB");
        assert_eq!(pretty_bytes(1_540), "1.5 kB");
        assert_eq!(pretty_bytes(52_000_000), "52 MB");
        assert_eq!(pretty_bytes(16_700_000_000), "17 GB");
        assert_eq!(pretty_bytes(8_200_000_000), "8.2 GB");
    }

    #[test]
    fn bytes_round_before_picking_the_unit() {
        assert_eq!(pretty_bytes(999_999), "1.0 MB");
        assert_eq!(pretty_bytes(999_500_000), "1.0 GB");
        assert_eq!(pretty_bytes(9_960), "10 kB");
        assert_eq!(pretty_bytes(9_940), "9.9 kB");
        assert_eq!(pretty_bytes(999_400), "999 kB");
    }

    #[test]
    fn uptime_joins_units() {
        assert_eq!(format_uptime(Duration::seconds(0)), "0 seconds");
        assert_eq!(format_uptime(Duration::seconds(1)), "1 second");
        assert_eq!(format_uptime(Duration::seconds(125)), "2 minutes and 5 seconds");
        assert_eq!(
            format_uptime(Duration::seconds(86_400 + 3 * 3_600 + 1)),
            "1 day, 3 hours and 1 second"
        );
    }

    #[test]
    fn negative_uptime_reads_as_zero() {
        assert_eq!(format_uptime(Duration::seconds(-30)), "0 seconds");
    }
}
