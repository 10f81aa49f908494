// Library interface for glucoview modules
// The binary and the integration tests both go through these exports

pub mod api;
pub mod chart;
pub mod classification;
pub mod config;
pub mod downsample;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod pipeline;
pub mod series;
pub mod session;
pub mod stats;

// Re-export commonly used types for convenience
pub use models::*;
pub use classification::{classify, GlucoseBand, TrendIndicator};
pub use config::AppConfig;
pub use downsample::{downsample, DownsampledPoint, Downsampler};
pub use error::{FetchError, GlucoseError, Result};
pub use fallback::{DaySource, FallbackOutcome, FallbackSearch};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use pipeline::{ChartView, GlucosePipeline};
pub use series::{merge_and_filter, SeriesFilter};
pub use session::{Action, GlucoseSession, GlucoseState, SessionStore};
pub use stats::StatsAggregator;
