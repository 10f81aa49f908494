//! Peak-preserving downsampling for chart rendering
//!
//! The reduction keeps short excursions visible:
//!
//! 1. Points deviating more than `1.5 × σ` from the mean, and points the
//!    server flagged as spike or low, are kept unconditionally.
//! 2. The remaining budget is filled by walking the series with a fixed
//!    stride, skipping points already kept.
//!
//! The output never exceeds the target. When the important points alone
//! reach the target no uniform sampling is done; flagged points are then
//! preferred over purely statistical outliers.

use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::debug;

use crate::models::Reading;

/// Default maximum number of rendered points
pub const DOWNSAMPLING_TARGET: usize = 20;

/// Deviation, in standard deviations, above which a point is significant
pub const SIGNIFICANCE_FACTOR: f64 = 1.5;

/// A reading that survived downsampling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownsampledPoint {
    pub reading: Reading,

    /// Position in the input series
    pub index: usize,

    /// Kept as outlier or flagged point rather than by uniform sampling
    pub important: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Downsampler {
    pub target: usize,
    pub significance_factor: f64,
}

impl Default for Downsampler {
    fn default() -> Self {
        Downsampler {
            target: DOWNSAMPLING_TARGET,
            significance_factor: SIGNIFICANCE_FACTOR,
        }
    }
}

impl Downsampler {
    pub fn new(target: usize) -> Self {
        Downsampler {
            target,
            ..Default::default()
        }
    }

    /// Reduce an ordered series to at most `target` points, in input order
    pub fn downsample(&self, series: &[Reading]) -> Vec<DownsampledPoint> {
        if series.len() <= self.target {
            return series
                .iter()
                .enumerate()
                .map(|(index, reading)| DownsampledPoint {
                    reading: reading.clone(),
                    index,
                    important: false,
                })
                .collect();
        }

        let important = self.important_mask(series);
        let important_count = important.iter().filter(|i| **i).count();

        let mut kept: Vec<(usize, bool)> = if important_count >= self.target {
            self.prioritized_important(series, &important)
        } else {
            let remaining = self.target - important_count;
            let stride = (series.len() / remaining).max(1);

            let mut sampled = Vec::with_capacity(remaining);
            for index in (0..series.len()).step_by(stride) {
                if sampled.len() >= remaining {
                    break;
                }
                if !important[index] {
                    sampled.push((index, false));
                }
            }

            important
                .iter()
                .enumerate()
                .filter(|(_, flag)| **flag)
                .map(|(index, _)| (index, true))
                .chain(sampled)
                .collect()
        };

        kept.sort_by_key(|(index, _)| *index);
        kept.truncate(self.target);

        debug!(
            input = series.len(),
            important = important_count,
            output = kept.len(),
            "Downsampled glucose series"
        );

        kept.into_iter()
            .map(|(index, important)| DownsampledPoint {
                reading: series[index].clone(),
                index,
                important,
            })
            .collect()
    }

    /// Outliers beyond the significance band plus server-flagged readings
    fn important_mask(&self, series: &[Reading]) -> Vec<bool> {
        let values: Vec<f64> = series.iter().map(|r| r.value).collect();
        let mean = values.iter().mean();
        let std_dev = values.iter().population_std_dev();
        let threshold = std_dev * self.significance_factor;

        series
            .iter()
            .map(|r| (r.value - mean).abs() > threshold || r.is_flagged())
            .collect()
    }

    /// Important points only, flagged ones first, capped at the target
    fn prioritized_important(&self, series: &[Reading], important: &[bool]) -> Vec<(usize, bool)> {
        let (flagged, outliers): (Vec<usize>, Vec<usize>) = (0..series.len())
            .filter(|i| important[*i])
            .partition(|i| series[*i].is_flagged());

        flagged
            .into_iter()
            .chain(outliers)
            .take(self.target)
            .map(|index| (index, true))
            .collect()
    }
}

/// Downsample with the default target of 20 points
pub fn downsample(series: &[Reading]) -> Vec<DownsampledPoint> {
    Downsampler::default().downsample(series)
}
