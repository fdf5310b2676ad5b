//! Parser for docker-stats style memory figures, e.g. `"12.45MiB / 256MiB"`.

/// Parse the left-hand (used) term of a `used / limit` pair into bytes.
/// Returns None on malformed input; percentages are not interpreted.
pub fn parse_mem_usage(s: &str) -> Option<u64> {
    let used = s.split('/').next()?.trim();
    parse_size(used)
}

/// Parse a `<number><unit>` size into bytes. Recognized units: B, KB, KiB,
/// MB, MiB, GB, GiB with the standard powers of 1000 or 1024.
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || s.contains('%') {
        return None;
    }
    let split = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)?;
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().ok()?;
    if value < 0.0 {
        return None;
    }
    let factor: u64 = match unit.trim() {
        "B" => 1,
        "KB" => 1000,
        "KiB" => 1024,
        "MB" => 1000 * 1000,
        "MiB" => 1024 * 1024,
        "GB" => 1000 * 1000 * 1000,
        "GiB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    Some((value * factor as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docker_stats_pairs() {
        assert_eq!(parse_mem_usage("12.45MiB / 256MiB"), Some(13_054_771));
        assert_eq!(parse_mem_usage("0B / 256MiB"), Some(0));
        assert_eq!(parse_mem_usage("1GiB / 2GiB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_mem_usage("512KiB / 256MiB"), Some(512 * 1024));
    }

    #[test]
    fn parses_decimal_units() {
        assert_eq!(parse_size("1KB"), Some(1000));
        assert_eq!(parse_size("1MB"), Some(1_000_000));
        assert_eq!(parse_size("2.5GB"), Some(2_500_000_000));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_mem_usage(""), None);
        assert_eq!(parse_mem_usage("garbage"), None);
        assert_eq!(parse_size("12.45"), None);
        assert_eq!(parse_size("MiB"), None);
        assert_eq!(parse_size("12.45TiB"), None);
        assert_eq!(parse_size("45%"), None);
    }

    #[test]
    fn left_term_wins() {
        // The limit side is ignored entirely, even when malformed.
        assert_eq!(parse_mem_usage("1MiB / garbage"), Some(1024 * 1024));
    }

    #[test]
    fn round_trips_at_same_precision() {
        // Re-formatting the parsed byte count at the input's unit and
        // precision reproduces the input.
        let bytes = parse_size("12.45MiB").unwrap();
        let reformatted = format!("{:.2}MiB", bytes as f64 / (1024.0 * 1024.0));
        assert_eq!(reformatted, "12.45MiB");
    }
}
