use chrono::{Duration, NaiveDate, TimeZone, Utc};
use glucoview::{
    classify, downsample, merge_and_filter, Action, DaySeries, GlucoseBand, GlucosePipeline,
    GlucoseState, Reading, RollingWindow, StatsAggregator, WindowSelector,
};

/// End-to-end runs of merge, downsample, stats and projection

fn custom_day() -> WindowSelector {
    WindowSelector::Custom(NaiveDate::from_ymd_opt(2025, 1, 9).unwrap())
}

#[test]
fn test_custom_window_two_point_day() {
    let baseline = vec![Reading::new(Utc.with_ymd_and_hms(2025, 1, 9, 10, 0, 0).unwrap(), 65.0)];
    let spikes = vec![Reading::new(Utc.with_ymd_and_hms(2025, 1, 9, 10, 5, 0).unwrap(), 250.0).spike()];
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();

    let merged = merge_and_filter(&baseline, &spikes, &[], custom_day(), now);
    assert_eq!(merged.len(), 2);
    assert!(merged[0].timestamp() < merged[1].timestamp());

    let reduced = downsample(&merged);
    assert_eq!(reduced.len(), 2);
    assert_eq!(classify(reduced[0].reading.value), GlucoseBand::Low);
    assert_eq!(classify(reduced[1].reading.value), GlucoseBand::High);

    let stats = StatsAggregator::summarize(&baseline, &spikes, &[]);
    assert_eq!(stats.min, 65.0);
    assert_eq!(stats.max, 250.0);
    assert_eq!(stats.average, 158);
    assert_eq!(stats.spike_count, 1);
    assert_eq!(stats.low_count, 0);
}

#[test]
fn test_rolling_day_cutoff() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let stale = Reading::new(Utc.with_ymd_and_hms(2025, 1, 9, 11, 0, 0).unwrap(), 110.0);
    let fresh = Reading::new(Utc.with_ymd_and_hms(2025, 1, 9, 13, 0, 0).unwrap(), 120.0);

    let window = WindowSelector::Rolling(RollingWindow::TwentyFourHours);
    let merged = merge_and_filter(&[stale, fresh.clone()], &[], &[], window, now);
    assert_eq!(merged, vec![fresh]);
}

#[test]
fn test_dense_day_keeps_excursions() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 23, 0, 0).unwrap();
    let start = now - Duration::hours(20);
    let baseline: Vec<Reading> = (0..80)
        .map(|i| Reading::new(start + Duration::minutes(i * 15), 100.0 + (i % 5) as f64))
        .collect();
    let spikes = vec![Reading::new(start + Duration::minutes(301), 240.0).spike()];
    let lows = vec![Reading::new(start + Duration::minutes(602), 55.0).low()];

    let window = WindowSelector::Rolling(RollingWindow::TwentyFourHours);
    let merged = merge_and_filter(&baseline, &spikes, &lows, window, now);
    assert_eq!(merged.len(), 82);

    let reduced = downsample(&merged);
    assert!(reduced.len() <= 20);
    assert!(reduced.iter().any(|p| p.reading.value == 240.0 && p.important));
    assert!(reduced.iter().any(|p| p.reading.value == 55.0 && p.important));
    assert!(reduced.windows(2).all(|w| w[0].index < w[1].index));
}

#[test]
fn test_sampling_cap_drops_late_categories() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let baseline: Vec<Reading> = (0..120)
        .map(|i| Reading::new(now - Duration::minutes(i * 5), 100.0))
        .collect();
    let spikes = vec![Reading::new(now - Duration::minutes(2), 260.0).spike()];

    let merged = merge_and_filter(&baseline, &spikes, &[], custom_day(), now);
    assert_eq!(merged.len(), 100);
    assert!(merged.iter().all(|r| !r.is_spike));
}

#[test]
fn test_state_to_view() {
    let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
    let at = Utc.with_ymd_and_hms(2025, 1, 9, 14, 0, 0).unwrap();
    let series = DaySeries::from_parts(
        vec![Reading::new(at, 95.0), Reading::new(at + Duration::minutes(5), 101.0)],
        vec![],
        vec![],
    );

    let state = GlucoseState::new(date)
        .reduce(Action::SetWindow(WindowSelector::Custom(date)))
        .reduce(Action::FetchStarted);
    let generation = state.generation;
    let state = state.reduce(Action::FetchSucceeded {
        generation,
        date,
        series,
    });

    let now = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
    let view = GlucosePipeline::default().render(&state, now, Some(1));

    assert_eq!(view.points.len(), 2);
    assert!(view.points[1].show_strip);
    assert_eq!(view.stats.average, 98);
    assert_eq!(view.trend.symbol, "~");
    assert_eq!(view.timezone, "America/Caracas");
    assert_eq!(view.labels.first().map(String::as_str), Some("00:00"));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["points"][0]["color"], "#06B6D4");
    assert_eq!(json["stats"]["average"], 98);
}
