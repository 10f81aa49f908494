//! Clinical band classification of glucose readings
//!
//! Bands (mg/dL):
//! - Low: `<= 70`
//! - Normal: `71..=140`
//! - High: everything else
//!
//! A fractional value in the open interval (70, 71) matches neither Low nor
//! Normal and is reported as High.

use serde::{Deserialize, Serialize};

/// Readings at or below this value are low
pub const LOW_THRESHOLD: f64 = 70.0;

/// Lower bound (inclusive) of the normal range
pub const NORMAL_MIN: f64 = 71.0;

/// Upper bound (inclusive) of the normal range
pub const NORMAL_MAX: f64 = 140.0;

/// Readings at or above this value are high by the range helpers
pub const HIGH_THRESHOLD: f64 = 141.0;

/// Clinical band of a glucose value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlucoseBand {
    Low,
    Normal,
    High,
}

impl GlucoseBand {
    /// Display color for the band
    pub fn color(&self) -> &'static str {
        match self {
            GlucoseBand::Low => "#EF4444",
            GlucoseBand::Normal => "#06B6D4",
            GlucoseBand::High => "#F59E0B",
        }
    }

    /// Localized label shown next to the average
    pub fn label(&self) -> &'static str {
        match self {
            GlucoseBand::Low => "Bajo",
            GlucoseBand::Normal => "Normal",
            GlucoseBand::High => "Alto",
        }
    }

    /// Symbol of the header trend indicator
    pub fn trend_symbol(&self) -> &'static str {
        match self {
            GlucoseBand::Low => "↓",
            GlucoseBand::Normal => "~",
            GlucoseBand::High => "↑",
        }
    }
}

impl std::fmt::Display for GlucoseBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Map a reading to its clinical band
pub fn classify(value: f64) -> GlucoseBand {
    if value <= LOW_THRESHOLD {
        GlucoseBand::Low
    } else if (NORMAL_MIN..=NORMAL_MAX).contains(&value) {
        GlucoseBand::Normal
    } else {
        GlucoseBand::High
    }
}

pub fn color_for(value: f64) -> &'static str {
    classify(value).color()
}

pub fn name_for(value: f64) -> &'static str {
    classify(value).label()
}

pub fn is_low(value: f64) -> bool {
    value <= LOW_THRESHOLD
}

pub fn is_normal(value: f64) -> bool {
    (NORMAL_MIN..=NORMAL_MAX).contains(&value)
}

pub fn is_high(value: f64) -> bool {
    value >= HIGH_THRESHOLD
}

/// Header trend indicator derived from the rounded average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendIndicator {
    pub band: GlucoseBand,
    pub line_color: &'static str,
    pub symbol: &'static str,
    pub label: &'static str,
}

impl TrendIndicator {
    pub fn from_average(average: i64) -> Self {
        let band = classify(average as f64);
        TrendIndicator {
            band,
            line_color: band.color(),
            symbol: band.trend_symbol(),
            label: band.label(),
        }
    }
}
