//! Merge of the three reading categories and time-window filtering
//!
//! Pipeline order is fixed: concatenate, cap, sort, filter. The cap is applied
//! before the sort, so when the baseline alone exceeds it the later categories
//! never make it into the window.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{DaySeries, Reading, WindowSelector};

/// Maximum number of concatenated readings considered per recomputation
pub const SAMPLE_DATA_LIMIT: usize = 100;

/// Merge and window filter with a configurable sampling cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesFilter {
    pub sample_limit: usize,
}

impl Default for SeriesFilter {
    fn default() -> Self {
        SeriesFilter {
            sample_limit: SAMPLE_DATA_LIMIT,
        }
    }
}

impl SeriesFilter {
    pub fn new(sample_limit: usize) -> Self {
        SeriesFilter { sample_limit }
    }

    /// Merge `baseline ++ spikes ++ lows`, cap, sort by time and keep what
    /// falls inside `window` relative to `now`.
    ///
    /// Readings without a finite value or a resolvable timestamp are dropped
    /// after the cap is applied.
    pub fn merge_and_filter(
        &self,
        baseline: &[Reading],
        spikes: &[Reading],
        lows: &[Reading],
        window: WindowSelector,
        now: DateTime<Utc>,
    ) -> Vec<Reading> {
        let capped: Vec<&Reading> = baseline
            .iter()
            .chain(spikes)
            .chain(lows)
            .take(self.sample_limit)
            .collect();

        let mut timed: Vec<(DateTime<Utc>, &Reading)> = Vec::with_capacity(capped.len());
        for reading in capped {
            if !reading.is_well_formed() {
                debug!(date = %reading.date, value = reading.value, "Skipping malformed reading");
                continue;
            }
            if let Some(at) = reading.timestamp() {
                timed.push((at, reading));
            }
        }

        timed.sort_by_key(|(at, _)| *at);

        let merged: Vec<Reading> = match window {
            WindowSelector::Custom(_) => timed.into_iter().map(|(_, r)| r.clone()).collect(),
            WindowSelector::Rolling(rolling) => {
                let cutoff = now - Duration::hours(rolling.hours());
                timed
                    .into_iter()
                    .filter(|(at, _)| *at >= cutoff)
                    .map(|(_, r)| r.clone())
                    .collect()
            }
        };

        debug!(
            window = %window,
            kept = merged.len(),
            "Merged and filtered glucose series"
        );

        merged
    }

    /// Convenience wrapper over a whole day response
    pub fn apply(&self, series: &DaySeries, window: WindowSelector, now: DateTime<Utc>) -> Vec<Reading> {
        self.merge_and_filter(&series.data, &series.spikes, &series.lows, window, now)
    }
}

/// [`SeriesFilter::merge_and_filter`] with the default sampling cap
pub fn merge_and_filter(
    baseline: &[Reading],
    spikes: &[Reading],
    lows: &[Reading],
    window: WindowSelector,
    now: DateTime<Utc>,
) -> Vec<Reading> {
    SeriesFilter::default().merge_and_filter(baseline, spikes, lows, window, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RollingWindow;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 9, h, m, 0).unwrap()
    }

    fn custom() -> WindowSelector {
        WindowSelector::Custom(NaiveDate::from_ymd_opt(2025, 1, 9).unwrap())
    }

    #[test]
    fn test_merge_sorts_across_categories() {
        let baseline = vec![Reading::new(at(10, 30), 100.0), Reading::new(at(9, 0), 90.0)];
        let spikes = vec![Reading::new(at(10, 0), 250.0).spike()];
        let lows = vec![Reading::new(at(8, 0), 60.0).low()];

        let merged = merge_and_filter(&baseline, &spikes, &lows, custom(), at(23, 0));
        let values: Vec<f64> = merged.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![60.0, 90.0, 250.0, 100.0]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let reading = Reading::new(at(10, 0), 250.0).spike();
        let merged = merge_and_filter(&[reading.clone()], &[reading], &[], custom(), at(23, 0));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_cap_applies_before_sort() {
        // Baseline alone fills the cap, so the earlier spike is lost
        let baseline: Vec<Reading> = (0..SAMPLE_DATA_LIMIT as i64)
            .map(|i| Reading::new(at(12, 0) + Duration::minutes(i), 100.0))
            .collect();
        let spikes = vec![Reading::new(at(1, 0), 300.0).spike()];

        let merged = merge_and_filter(&baseline, &spikes, &[], custom(), at(23, 0));
        assert_eq!(merged.len(), SAMPLE_DATA_LIMIT);
        assert!(merged.iter().all(|r| !r.is_spike));
    }

    #[test]
    fn test_rolling_window_cutoff() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let too_old = Reading::new(Utc.with_ymd_and_hms(2025, 1, 9, 11, 0, 0).unwrap(), 110.0);
        let recent = Reading::new(Utc.with_ymd_and_hms(2025, 1, 9, 13, 0, 0).unwrap(), 120.0);
        let window = WindowSelector::Rolling(RollingWindow::TwentyFourHours);

        let merged = merge_and_filter(&[too_old, recent.clone()], &[], &[], window, now);
        assert_eq!(merged, vec![recent]);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let edge = Reading::new(now - Duration::hours(6), 100.0);
        let window = WindowSelector::Rolling(RollingWindow::SixHours);
        assert_eq!(merge_and_filter(&[edge], &[], &[], window, now).len(), 1);
    }

    #[test]
    fn test_stale_series_yields_empty() {
        let now = Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap();
        let window = WindowSelector::Rolling(RollingWindow::TwelveHours);
        let merged = merge_and_filter(&[Reading::new(at(10, 0), 100.0)], &[], &[], window, now);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_malformed_readings_are_skipped() {
        let mut no_time = Reading::new(at(10, 0), 100.0);
        no_time.date_unix = None;
        no_time.date = "not a date".to_string();
        let nan = Reading::new(at(11, 0), f64::NAN);
        let ok = Reading::new(at(12, 0), 130.0);

        let merged = merge_and_filter(&[no_time, nan, ok.clone()], &[], &[], custom(), at(23, 0));
        assert_eq!(merged, vec![ok]);
    }

    proptest! {
        #[test]
        fn test_filter_is_idempotent(
            offsets in proptest::collection::vec(0i64..(48 * 60), 0..150),
            hours in prop_oneof![Just(6u32), Just(12u32), Just(24u32)],
        ) {
            let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
            let readings: Vec<Reading> = offsets
                .iter()
                .map(|m| Reading::new(now - Duration::minutes(*m), 100.0 + *m as f64 % 50.0))
                .collect();
            let window = WindowSelector::Rolling(RollingWindow::from_hours(hours).unwrap());

            let once = merge_and_filter(&readings, &[], &[], window, now);
            let twice = merge_and_filter(&once, &[], &[], window, now);
            prop_assert!(once.len() <= SAMPLE_DATA_LIMIT);
            prop_assert_eq!(once, twice);
        }
    }
}
