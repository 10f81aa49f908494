//! Projection of downsampled readings into chart points and time-axis labels

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::classification::classify;
use crate::downsample::DownsampledPoint;
use crate::models::{ChartPoint, WindowSelector};

pub const DEFAULT_POINT_RADIUS: u32 = 5;
pub const SELECTED_POINT_RADIUS: u32 = 8;
pub const STRIP_HEIGHT: u32 = 200;

/// The time axis is always split into this many sections
pub const CHART_SECTIONS: usize = 24;

/// Fixed y-axis scale
pub const CHART_MAX_VALUE: f64 = 200.0;
pub const CHART_MIN_VALUE: f64 = 0.0;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Caracas;

/// Map downsampled readings to display points. `selected` is an index into
/// the output sequence.
pub fn to_chart_points(points: &[DownsampledPoint], selected: Option<usize>) -> Vec<ChartPoint> {
    points
        .iter()
        .enumerate()
        .map(|(position, point)| {
            let value = point.reading.value;
            let band = classify(value);
            let is_selected = selected == Some(position);

            ChartPoint {
                value,
                date: point.reading.date.clone(),
                timestamp: point.reading.timestamp(),
                text: format_value(value),
                band,
                color: band.color(),
                radius: if is_selected {
                    SELECTED_POINT_RADIUS
                } else {
                    DEFAULT_POINT_RADIUS
                },
                show_strip: is_selected,
                strip_height: if is_selected { STRIP_HEIGHT } else { 0 },
                important: point.important,
            }
        })
        .collect()
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Resolve a session timezone name, falling back to the default zone
pub fn resolve_timezone(name: &str) -> Tz {
    if name.trim().is_empty() {
        return DEFAULT_TIMEZONE;
    }
    name.parse().unwrap_or_else(|_| {
        warn!(timezone = name, "Unknown timezone, using default");
        DEFAULT_TIMEZONE
    })
}

/// `HH:MM` labels for the 24 axis sections.
///
/// Rolling windows step back from `now` by the window's interval; a custom
/// date gets one label per hour of that day.
pub fn time_axis_labels(window: WindowSelector, now: DateTime<Utc>, tz: Tz) -> Vec<String> {
    match window {
        WindowSelector::Custom(date) => hourly_labels(date, tz),
        WindowSelector::Rolling(rolling) => (0..CHART_SECTIONS as i64)
            .rev()
            .map(|i| {
                let at = now - Duration::minutes(i * rolling.interval_minutes());
                at.with_timezone(&tz).format("%H:%M").to_string()
            })
            .collect(),
    }
}

fn hourly_labels(date: NaiveDate, tz: Tz) -> Vec<String> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let start = tz
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc());

    (0..CHART_SECTIONS as i64)
        .map(|h| (start + Duration::hours(h)).with_timezone(&tz).format("%H:%M").to_string())
        .collect()
}

/// Time of a chart point in the session timezone, for the pointer label.
/// Formatted from the resolved instant, never from the raw date string.
pub fn point_time_label(point: &ChartPoint, tz: Tz) -> Option<String> {
    point
        .timestamp
        .map(|at| at.with_timezone(&tz).format("%H:%M").to_string())
}
