use statrs::statistics::Statistics;
use tracing::debug;

use crate::models::{DaySeries, Reading, StatsSummary};

/// Summary statistics over the full, uncapped series of one fetch
pub struct StatsAggregator;

impl StatsAggregator {
    /// Min, max and rounded mean over `baseline ++ spikes ++ lows`; the
    /// spike and low counts are the lengths of those two categories.
    ///
    /// Non-finite values are left out of min/max/average but still counted
    /// in their category. An empty series yields all zeros.
    pub fn summarize(baseline: &[Reading], spikes: &[Reading], lows: &[Reading]) -> StatsSummary {
        let values: Vec<f64> = baseline
            .iter()
            .chain(spikes)
            .chain(lows)
            .map(|r| r.value)
            .filter(|v| v.is_finite())
            .collect();

        if values.is_empty() {
            return StatsSummary {
                spike_count: spikes.len(),
                low_count: lows.len(),
                ..Default::default()
            };
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().mean();

        let summary = StatsSummary {
            min,
            max,
            average: round_half_up(mean),
            spike_count: spikes.len(),
            low_count: lows.len(),
        };

        debug!(?summary, readings = values.len(), "Computed glucose stats");
        summary
    }

    pub fn summarize_day(series: &DaySeries) -> StatsSummary {
        Self::summarize(&series.data, &series.spikes, &series.lows)
    }
}

/// Nearest integer, halves rounded towards positive infinity
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn readings(values: &[f64]) -> Vec<Reading> {
        let start = Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Reading::new(start + Duration::minutes(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_empty_series() {
        let stats = StatsAggregator::summarize(&[], &[], &[]);
        assert_eq!(stats, StatsSummary::default());
    }

    #[test]
    fn test_min_max_average_and_counts() {
        let baseline = readings(&[20.0, 100.0, 180.0]);
        let spikes = readings(&[300.0, 260.0]);
        let lows = readings(&[45.0]);

        let stats = StatsAggregator::summarize(&baseline, &spikes, &lows);
        assert_eq!(stats.min, 20.0);
        assert_eq!(stats.max, 300.0);
        assert_eq!(stats.average, 151); // 905 / 6 = 150.83
        assert_eq!(stats.spike_count, 2);
        assert_eq!(stats.low_count, 1);
    }

    #[test]
    fn test_average_rounds_half_up() {
        let stats = StatsAggregator::summarize(&readings(&[65.0]), &readings(&[250.0]), &[]);
        assert_eq!(stats.average, 158);
        assert_eq!(round_half_up(-2.5), -2);
    }

    #[test]
    fn test_stats_ignore_sampling_cap() {
        let baseline = readings(&[100.0; 150]);
        let spikes = readings(&[400.0]);
        let stats = StatsAggregator::summarize(&baseline, &spikes, &[]);
        assert_eq!(stats.max, 400.0);
    }

    #[test]
    fn test_non_finite_values_skipped() {
        let stats = StatsAggregator::summarize(&readings(&[f64::NAN, 90.0]), &[], &[]);
        assert_eq!(stats.min, 90.0);
        assert_eq!(stats.max, 90.0);
        assert_eq!(stats.average, 90);
    }
}
