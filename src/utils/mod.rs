/// Rank assigned to teams whose rank cell is missing or unparseable.
/// Sorts behind every real rank.
pub const UNRANKED: u32 = 999;

/// Default for continuous metrics whose cell cannot be read.
pub const METRIC_DEFAULT: f64 = 0.0;

/// Parse a cell as a finite real number.
///
/// Surrounding whitespace is ignored. `NaN` and infinities are rejected.
pub fn parse_metric(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a rank-like cell as a positive integer.
///
/// Accepts `"12"` and integral floats such as `"12.0"`; zero, negatives and
/// fractional values are not ranks.
pub fn parse_rank(cell: &str) -> Option<u32> {
    let trimmed = cell.trim();
    if let Ok(rank) = trimmed.parse::<u32>() {
        return (rank > 0).then_some(rank);
    }
    let value = parse_metric(trimmed)?;
    if value >= 1.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Split a `"W-L"` record on the first dash.
///
/// Both halves must be non-negative integers, otherwise the record is not
/// usable and `None` is returned (never a half-populated pair).
pub fn split_record(record: &str) -> Option<(u32, u32)> {
    let (wins, losses) = record.trim().split_once('-')?;
    let wins = wins.trim().parse::<u32>().ok()?;
    let losses = losses.trim().parse::<u32>().ok()?;
    Some((wins, losses))
}

/// Linear-interpolation quantile over an ascending slice (numpy's default).
///
/// Returns `None` for an empty slice; `q` is clamped into `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Format a percentile for display, e.g. `87th`.
pub fn format_percentile(percentile: f64) -> String {
    let rounded = percentile.round() as i64;
    let suffix = match (rounded % 100, rounded % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{}{}", rounded, suffix)
}

/// Validate team name format
pub fn validate_team_name(name: &str) -> bool {
    !name.trim().is_empty() && name.len() <= 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric() {
        assert_eq!(parse_metric(" 118.4 "), Some(118.4));
        assert_eq!(parse_metric("-3.25"), Some(-3.25));
        assert_eq!(parse_metric(""), None);
        assert_eq!(parse_metric("n/a"), None);
        assert_eq!(parse_metric("NaN"), None);
        assert_eq!(parse_metric("inf"), None);
    }

    #[test]
    fn test_parse_rank() {
        assert_eq!(parse_rank("12"), Some(12));
        assert_eq!(parse_rank(" 7.0"), Some(7));
        assert_eq!(parse_rank("0"), None);
        assert_eq!(parse_rank("-4"), None);
        assert_eq!(parse_rank("3.5"), None);
        assert_eq!(parse_rank("NR"), None);
    }

    #[test]
    fn test_split_record() {
        assert_eq!(split_record("18-9"), Some((18, 9)));
        assert_eq!(split_record(" 0-0 "), Some((0, 0)));
        assert_eq!(split_record("TBD"), None);
        assert_eq!(split_record("18-"), None);
        assert_eq!(split_record("18-9-1"), None);
        assert_eq!(split_record("x-9"), None);
    }

    #[test]
    fn test_quantile_sorted() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&values, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&values, 1.0), Some(4.0));
        assert!((quantile_sorted(&values, 0.75).unwrap() - 3.25).abs() < 1e-12);
        assert!((quantile_sorted(&values, 0.25).unwrap() - 1.75).abs() < 1e-12);
        assert_eq!(quantile_sorted(&[5.0], 0.8), Some(5.0));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_format_percentile() {
        assert_eq!(format_percentile(87.2), "87th");
        assert_eq!(format_percentile(1.0), "1st");
        assert_eq!(format_percentile(22.0), "22nd");
        assert_eq!(format_percentile(13.0), "13th");
        assert_eq!(format_percentile(63.0), "63rd");
    }
}
