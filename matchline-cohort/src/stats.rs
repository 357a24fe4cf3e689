//! Aggregation statistics
//!
//! Means for absolute, count-like metrics (they preserve realistic totals);
//! medians for rate-like metrics (they resist outlier skew from a single
//! very-active or very-inactive member).

/// Arithmetic mean; None for an empty sample
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; even-sized samples average the two middle values
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("rates are finite"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Mean of count values, rounded back to a whole count
pub fn mean_count(values: &[i64]) -> Option<i64> {
    let floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    mean(&floats).map(|m| m.round() as i64)
}

/// Median over the present (non-None) rates of a sample. Members without a
/// defined rate that day (zero denominator) are excluded rather than
/// counted as zero.
pub fn median_rate(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    median(&present)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_counts() {
        assert_eq!(mean_count(&[10, 20, 30]), Some(20));
        assert_eq!(mean_count(&[1, 2]), Some(2)); // 1.5 rounds to 2
        assert_eq!(mean_count(&[]), None);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[0.1, 0.9, 0.5]), Some(0.5));
        let even = median(&[0.2, 0.4]).unwrap();
        assert!((even - 0.3).abs() < 1e-9);
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn median_rate_skips_undefined_members() {
        assert_eq!(median_rate(&[Some(0.1), None, Some(0.5), Some(0.9)]), Some(0.5));
        assert_eq!(median_rate(&[None, None]), None);
    }
}
