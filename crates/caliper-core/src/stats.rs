//! Timing statistics over successful run durations.
//!
//! All values are in seconds. Standard deviation is the population form
//! (divide by `n`), so a single sample yields `0.0`. Percentiles use linear
//! interpolation between the closest ranks of the sorted sample.

use serde::{Deserialize, Serialize};

/// Summary statistics for one benchmark invocation.
///
/// `Default` is the all-zero value reported when no run succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Number of successful runs the statistics were computed from.
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Compute statistics from an unordered list of durations in seconds.
pub fn calculate_statistics(durations: &[f64]) -> Statistics {
    if durations.is_empty() {
        return Statistics::default();
    }

    let mut sorted = durations.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mean = durations.iter().sum::<f64>() / n as f64;

    let variance = durations
        .iter()
        .map(|d| {
            let diff = d - mean;
            diff * diff
        })
        .sum::<f64>()
        / n as f64;

    Statistics {
        n,
        mean,
        median: percentile(&sorted, 50.0),
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[n - 1],
        p90: percentile(&sorted, 90.0),
        p95: percentile(&sorted, 95.0),
    }
}

/// Percentile `p` (0..=100) of an ascending-sorted slice.
///
/// `rank = p/100 * (n-1)`; the result interpolates between
/// `sorted[floor(rank)]` and `sorted[ceil(rank)]` by the fractional part.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (p / 100.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                return sorted[lower];
            }
            let weight = rank - lower as f64;
            sorted[lower] * (1.0 - weight) + sorted[upper] * weight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let stats = calculate_statistics(&[]);
        assert_eq!(stats, Statistics::default());
        assert_eq!(stats.n, 0);
    }

    #[test]
    fn test_single_value_fills_every_field() {
        let stats = calculate_statistics(&[4.25]);
        assert_eq!(stats.n, 1);
        for v in [
            stats.mean,
            stats.median,
            stats.min,
            stats.max,
            stats.p90,
            stats.p95,
        ] {
            assert_eq!(v, 4.25);
        }
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_percentile_interpolation_known_values() {
        let stats = calculate_statistics(&[40.0, 10.0, 30.0, 20.0]);
        assert!(approx(stats.p90, 37.0), "p90 = {}", stats.p90);
        assert!(approx(stats.p95, 38.5), "p95 = {}", stats.p95);
        assert!(approx(stats.median, 25.0));
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
    }

    #[test]
    fn test_population_stddev() {
        let stats = calculate_statistics(&[1.0, 2.0, 3.0]);
        assert!(approx(stats.mean, 2.0));
        assert!(approx(stats.median, 2.0));
        assert!(approx(stats.std_dev, (2.0f64 / 3.0).sqrt()));
        assert!((stats.std_dev - 0.8165).abs() < 1e-4);
    }

    #[test]
    fn test_percentile_exact_rank() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
    }

    #[test]
    fn test_ordering_properties_hold() {
        let samples: [&[f64]; 4] = [
            &[0.5, 0.1, 9.0, 3.3, 3.3],
            &[1.0, 1.0],
            &[7.0, 2.0, 5.5, 0.0, 12.25, 3.0, 8.0],
            &[100.0, 0.001],
        ];
        for sample in samples {
            let s = calculate_statistics(sample);
            assert!(s.min <= s.median, "{:?}", s);
            assert!(s.median <= s.p90, "{:?}", s);
            assert!(s.p90 <= s.p95, "{:?}", s);
            assert!(s.p95 <= s.max, "{:?}", s);
            assert!(s.min <= s.mean && s.mean <= s.max, "{:?}", s);
        }
    }

    #[test]
    fn test_serializes_std_dev_as_camel_case() {
        let json = serde_json::to_value(calculate_statistics(&[1.0])).unwrap();
        assert!(json.get("stdDev").is_some());
        assert!(json.get("p95").is_some());
    }
}
