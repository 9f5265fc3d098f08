use cloth_summary_model::{MetricValue, RunMetrics};

/// Percentile ranks reported for every distribution
pub(crate) const PERCENTILES: [u8; 5] = [5, 25, 50, 75, 95];

/// Summary statistics of one value distribution
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DistributionStats {
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    /// Values at the [PERCENTILES] ranks, in the same order
    pub percentiles: [f64; 5],
}

impl DistributionStats {
    /// Compute the statistics of `values`.
    ///
    /// Returns `None` for an empty slice: every statistic of an empty
    /// distribution is undefined and must be reported as
    /// [MetricValue::Empty], never fabricated.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        // Population variance, not the sample estimator
        let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / count;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            mean,
            variance,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            percentiles: PERCENTILES.map(|rank| percentile_of_sorted(&sorted, rank)),
        })
    }
}

/// Value at percentile `rank` of an ascending-sorted, non-empty slice, with
/// linear interpolation between the two closest ranks.
fn percentile_of_sorted(sorted: &[f64], rank: u8) -> f64 {
    let position = f64::from(rank) / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Insert one distribution's statistics into `metrics` under the
/// `<name>/average`, `<name>/variance`, `<name>/min`, `<name>/max` and
/// `<name>/<rank>-percentile` keys.
///
/// `None` statistics write [MetricValue::Empty] under every key, so a run
/// keeps a stable set of keys whether or not the distribution had values.
pub(crate) fn insert_distribution_stats(
    metrics: &mut RunMetrics,
    name: &str,
    stats: Option<&DistributionStats>,
) {
    metrics.insert(
        format!("{name}/average"),
        float_or_empty(stats.map(|s| s.mean)),
    );
    metrics.insert(
        format!("{name}/variance"),
        float_or_empty(stats.map(|s| s.variance)),
    );
    metrics.insert(format!("{name}/min"), float_or_empty(stats.map(|s| s.min)));
    metrics.insert(format!("{name}/max"), float_or_empty(stats.map(|s| s.max)));
    for (index, rank) in PERCENTILES.iter().enumerate() {
        metrics.insert(
            format!("{name}/{rank}-percentile"),
            float_or_empty(stats.map(|s| s.percentiles[index])),
        );
    }
}

fn float_or_empty(value: Option<f64>) -> MetricValue {
    value.map(MetricValue::Float).unwrap_or(MetricValue::Empty)
}
