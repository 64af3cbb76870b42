//! Human-readable formatting of byte and time quantities.

/// Formats a byte count with 1024-based units.
pub fn pretty_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Formats a nanosecond duration with an adaptive unit.
pub fn pretty_duration(ns: u64) -> String {
    if ns >= 1_000_000_000 {
        format!("{:.3} s", ns as f64 / 1e9)
    } else if ns >= 1_000_000 {
        format!("{:.3} ms", ns as f64 / 1e6)
    } else if ns >= 1_000 {
        format!("{:.3} us", ns as f64 / 1e3)
    } else {
        format!("{ns} ns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pick_sensible_units() {
        assert_eq!(pretty_bytes(0), "0 B");
        assert_eq!(pretty_bytes(512), "512 B");
        assert_eq!(pretty_bytes(2048), "2.00 KiB");
        assert_eq!(pretty_bytes(3 << 30), "3.00 GiB");
        assert_eq!(pretty_bytes(1536 << 20), "1.50 GiB");
    }

    #[test]
    fn durations_pick_sensible_units() {
        assert_eq!(pretty_duration(500), "500 ns");
        assert_eq!(pretty_duration(1_500), "1.500 us");
        assert_eq!(pretty_duration(13_000_000), "13.000 ms");
        assert_eq!(pretty_duration(2_000_000_000), "2.000 s");
    }
}
