//! Human-readable duration formatting shared by console output and reports.

/// Compact duration: `0s`, `850ms`, `12.3s`, `4m5s`, `1h2m3s`.
pub fn format_duration(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "0s".to_string();
    }
    // Choose the unit after rounding so 0.9996 reads 1.0s, not 1000ms.
    let millis = (seconds * 1000.0).round();
    if millis < 1000.0 {
        return format!("{}ms", millis as u64);
    }
    if (seconds * 10.0).round() < 600.0 {
        return format!("{:.1}s", seconds);
    }

    let whole = (seconds as u64).max(60);
    let (hours, minutes, secs) = (whole / 3600, (whole / 60) % 60, whole % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, secs)
    } else {
        format!("{}m{}s", minutes, secs)
    }
}

/// Compact duration followed by the exact value in seconds.
pub fn format_duration_detailed(seconds: f64) -> String {
    format!("{} ({:.3}s)", format_duration(seconds), seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ranges() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(0.25), "250ms");
        assert_eq!(format_duration(12.34), "12.3s");
        assert_eq!(format_duration(125.0), "2m5s");
        assert_eq!(format_duration(3723.9), "1h2m3s");
    }

    #[test]
    fn test_format_duration_unit_boundaries() {
        assert_eq!(format_duration(0.9994), "999ms");
        assert_eq!(format_duration(0.9996), "1.0s");
        assert_eq!(format_duration(1.0), "1.0s");
        assert_eq!(format_duration(59.94), "59.9s");
        assert_eq!(format_duration(59.96), "1m0s");
        assert_eq!(format_duration(60.0), "1m0s");
    }

    #[test]
    fn test_format_duration_detailed() {
        assert_eq!(format_duration_detailed(1.5), "1.5s (1.500s)");
    }
}
