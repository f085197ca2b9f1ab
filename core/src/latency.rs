use serde::{Deserialize, Serialize};

/// Reduction of one timing sample into the figures the report compares.
///
/// All values are milliseconds. `stddev` uses the sample (n - 1) estimator and
/// is defined as `0.0` when fewer than two samples were taken, so a summary is
/// always well-formed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
    pub p50: f64,
    pub p95: f64,
}

impl LatencySummary {
    /// Reduce a sample sequence. Returns `None` for an empty sample.
    pub fn from_samples(samples_ms: &[f64]) -> Option<Self> {
        let mean = mean(samples_ms)?;
        let min = samples_ms.iter().cloned().fold(f64::MAX, f64::min);
        let max = samples_ms.iter().cloned().fold(f64::MIN, f64::max);

        let mut sorted = samples_ms.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            samples: samples_ms.len(),
            mean,
            min,
            max,
            stddev: sample_std_deviation(samples_ms, mean),
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
        })
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    match data.len() {
        0 => None,
        count => Some(data.iter().sum::<f64>() / count as f64),
    }
}

fn sample_std_deviation(data: &[f64], mean: f64) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let variance = data
        .iter()
        .map(|value| {
            let diff = mean - *value;

            diff * diff
        })
        .sum::<f64>()
        / (data.len() - 1) as f64;

    variance.sqrt()
}

/// Nearest-rank percentile over an already sorted, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::LatencySummary;

    fn assert_close(actual: f64, expected: f64) {
        let eps = 1e-9_f64;
        assert!(
            (actual - expected).abs() <= eps,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_sample_has_no_summary() {
        assert!(LatencySummary::from_samples(&[]).is_none());
    }

    #[test]
    fn single_sample_has_zero_stddev() {
        let summary = LatencySummary::from_samples(&[4.5]).unwrap();

        assert_eq!(summary.samples, 1);
        assert_eq!(summary.stddev, 0.0);
        assert_close(summary.mean, 4.5);
        assert_close(summary.min, 4.5);
        assert_close(summary.max, 4.5);
        assert_close(summary.p95, 4.5);
    }

    #[test]
    fn multiple_samples_use_sample_stddev() {
        let summary = LatencySummary::from_samples(&[1.0, 2.0, 3.0, 4.0]).unwrap();

        assert_close(summary.mean, 2.5);
        assert_close(summary.min, 1.0);
        assert_close(summary.max, 4.0);

        // sum of squared deviations = 5.0, divided by n - 1 = 3
        assert_close(summary.stddev, (5.0_f64 / 3.0).sqrt());
    }

    #[test]
    fn ordering_invariants_hold_for_uneven_samples() {
        let samples = [0.31, 12.0, 0.29, 0.33, 5.7, 0.30, 0.41];
        let summary = LatencySummary::from_samples(&samples).unwrap();

        assert!(summary.stddev >= 0.0);
        assert!(summary.min <= summary.mean && summary.mean <= summary.max);
        assert!(summary.min <= summary.p50 && summary.p50 <= summary.p95);
        assert!(summary.p95 <= summary.max);
    }

    #[test]
    fn summary_does_not_depend_on_sample_order() {
        let forward = LatencySummary::from_samples(&[3.0, 1.0, 2.0, 8.0]).unwrap();
        let reversed = LatencySummary::from_samples(&[8.0, 2.0, 1.0, 3.0]).unwrap();

        assert_close(forward.mean, reversed.mean);
        assert_close(forward.min, reversed.min);
        assert_close(forward.max, reversed.max);
        assert_close(forward.p50, reversed.p50);
    }

    #[test]
    fn identical_samples_have_zero_spread() {
        let summary = LatencySummary::from_samples(&[2.0; 16]).unwrap();
        assert_close(summary.stddev, 0.0);
        assert_close(summary.p50, 2.0);
    }
}
