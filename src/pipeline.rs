//! Display recomputation from the committed session state
//!
//! Everything here is a pure function of a [`GlucoseState`] snapshot and the
//! current time. Rendering the same snapshot twice yields the same view.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::chart::{
    resolve_timezone, time_axis_labels, to_chart_points, CHART_MAX_VALUE, CHART_MIN_VALUE,
    CHART_SECTIONS,
};
use crate::classification::TrendIndicator;
use crate::downsample::Downsampler;
use crate::models::{ChartPoint, StatsSummary, WindowSelector};
use crate::series::SeriesFilter;
use crate::session::GlucoseState;
use crate::stats::StatsAggregator;

/// Everything the chart screen shows for one state snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub window: String,
    pub date: NaiveDate,
    pub glucose_source: String,
    pub timezone: String,

    /// Readings left in the window before downsampling
    pub readings_in_window: usize,
    pub points: Vec<ChartPoint>,

    /// Over the whole fetched day, independent of the window
    pub stats: StatsSummary,
    pub trend: TrendIndicator,

    pub labels: Vec<String>,
    pub y_min: f64,
    pub y_max: f64,
    pub sections: usize,
}

impl ChartView {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlucosePipeline {
    pub filter: SeriesFilter,
    pub downsampler: Downsampler,
}

impl GlucosePipeline {
    pub fn new(filter: SeriesFilter, downsampler: Downsampler) -> Self {
        GlucosePipeline {
            filter,
            downsampler,
        }
    }

    /// Merge, window, downsample and project the committed series.
    ///
    /// `selected` indexes into the resulting point list; out-of-range
    /// selections select nothing.
    pub fn render(&self, state: &GlucoseState, now: DateTime<Utc>, selected: Option<usize>) -> ChartView {
        let tz: Tz = resolve_timezone(&state.timezone);
        let window: WindowSelector = state.window;

        let merged = self.filter.apply(&state.series, window, now);
        let reduced = self.downsampler.downsample(&merged);
        let points = to_chart_points(&reduced, selected.filter(|i| *i < reduced.len()));

        let stats = StatsAggregator::summarize_day(&state.series);
        let trend = TrendIndicator::from_average(stats.average);

        debug!(
            window = %window,
            merged = merged.len(),
            points = points.len(),
            average = stats.average,
            "Rendered chart view"
        );

        ChartView {
            window: window.label().to_string(),
            date: state.selected_date,
            glucose_source: state.glucose_source.clone(),
            timezone: tz.name().to_string(),
            readings_in_window: merged.len(),
            points,
            stats,
            trend,
            labels: time_axis_labels(window, now, tz),
            y_min: CHART_MIN_VALUE,
            y_max: CHART_MAX_VALUE,
            sections: CHART_SECTIONS,
        }
    }
}
