//! Bar-interval parsing, lookback sizing, and annualization.

/// Minutes in a non-leap year, used as the annualization base (365 * 24 * 60).
const MINUTES_PER_YEAR: f64 = 525_600.0;

/// Parses a bar interval string (e.g. "5min", "15m", "1h", "1d", "1w") into
/// minutes. Matching is case-insensitive and falls back to daily (1440
/// minutes) when the string can't be parsed, mirroring the original engine's
/// permissive default rather than failing the whole run over a cosmetic
/// config typo.
pub fn parse_interval_minutes(interval: &str) -> f64 {
    let s = interval.trim().to_lowercase();

    let (numeric, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s.as_str(), ""),
    };

    let value: f64 = match numeric.parse() {
        Ok(v) => v,
        Err(_) => return 1440.0,
    };

    if suffix.starts_with("min") || suffix.starts_with('m') {
        value
    } else if suffix.starts_with('h') {
        value * 60.0
    } else if suffix.starts_with('d') {
        value * 1440.0
    } else if suffix.starts_with('w') {
        value * 10_080.0
    } else {
        1440.0
    }
}

/// Annualization factor: number of bars of this size in a year.
pub fn ann_factor(interval: &str) -> f64 {
    MINUTES_PER_YEAR / parse_interval_minutes(interval)
}

/// Converts a lookback window expressed in hours into a bar count for the
/// given interval, floored at 10 bars so the rolling statistics always have
/// a minimally sane sample even at coarse intervals.
pub fn lookback_bars(lookback_hours: f64, interval: &str) -> usize {
    let minutes = parse_interval_minutes(interval);
    let bars = (lookback_hours * 60.0 / minutes).floor();
    (bars as i64).max(10) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_suffixes() {
        assert_eq!(parse_interval_minutes("5min"), 5.0);
        assert_eq!(parse_interval_minutes("15m"), 15.0);
        assert_eq!(parse_interval_minutes("1h"), 60.0);
        assert_eq!(parse_interval_minutes("4h"), 240.0);
        assert_eq!(parse_interval_minutes("1d"), 1440.0);
        assert_eq!(parse_interval_minutes("1w"), 10_080.0);
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(parse_interval_minutes("1H"), 60.0);
        assert_eq!(parse_interval_minutes("1D"), 1440.0);
    }

    #[test]
    fn unparseable_falls_back_to_daily() {
        assert_eq!(parse_interval_minutes("garbage"), 1440.0);
    }

    #[test]
    fn ann_factor_matches_hourly_bars_per_year() {
        assert!((ann_factor("1h") - 8760.0).abs() < 1e-6);
    }

    #[test]
    fn lookback_bars_floors_and_has_a_minimum() {
        assert_eq!(lookback_bars(24.0, "1h"), 24);
        assert_eq!(lookback_bars(1.0, "1h"), 10);
        assert_eq!(lookback_bars(24.0, "5min"), 288);
    }

    #[test]
    fn lookback_bars_is_monotone_in_hours() {
        let a = lookback_bars(10.0, "15min");
        let b = lookback_bars(20.0, "15min");
        assert!(b >= a);
    }
}
