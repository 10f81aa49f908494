use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::classification::GlucoseBand;

/// A single glucose observation as delivered by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Capturing device or method
    #[serde(default)]
    pub source: String,

    /// ISO-8601 timestamp
    #[serde(default)]
    pub date: String,

    /// Epoch seconds, authoritative over `date` when present and non-zero.
    /// The server may send it as an integer or a float.
    #[serde(default, deserialize_with = "deserialize_epoch")]
    pub date_unix: Option<i64>,

    /// Glucose concentration in mg/dL
    pub value: f64,

    /// Reading was retrieved from device history
    #[serde(default)]
    pub historic: bool,

    /// Server flagged this reading as a high excursion
    #[serde(default)]
    pub is_spike: bool,

    /// Reading is an average of several samples
    #[serde(default)]
    pub averaged: bool,

    /// Server flagged this reading as a low excursion
    #[serde(default)]
    pub is_pick_low: bool,
}

impl Reading {
    /// Build a plain reading at the given instant
    pub fn new(at: DateTime<Utc>, value: f64) -> Self {
        Reading {
            source: String::new(),
            date: at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            date_unix: Some(at.timestamp()),
            value,
            historic: false,
            is_spike: false,
            averaged: false,
            is_pick_low: false,
        }
    }

    /// Mark as a server-classified spike
    pub fn spike(mut self) -> Self {
        self.is_spike = true;
        self
    }

    /// Mark as a server-classified low
    pub fn low(mut self) -> Self {
        self.is_pick_low = true;
        self
    }

    /// Instant of the reading. The epoch form wins so the string is never
    /// re-interpreted in a local timezone.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Some(secs) = self.date_unix.filter(|s| *s != 0) {
            return DateTime::from_timestamp(secs, 0);
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(&self.date) {
            return Some(parsed.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(&self.date, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// True when the server flagged the reading as spike or low
    pub fn is_flagged(&self) -> bool {
        self.is_spike || self.is_pick_low
    }

    /// Usable by the pipeline: finite value and a resolvable timestamp
    pub fn is_well_formed(&self) -> bool {
        self.value.is_finite() && self.timestamp().is_some()
    }
}

fn deserialize_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = Option::<f64>::deserialize(deserializer)?;
    Ok(secs.filter(|s| s.is_finite()).map(|s| s.trunc() as i64))
}

/// Daily glucose score sample, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSample {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub unix_date: Option<i64>,
    pub value: f64,
}

/// Everything the gateway returns for one calendar day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySeries {
    /// Baseline readings
    #[serde(default)]
    pub data: Vec<Reading>,

    /// Readings the server classified as spikes
    #[serde(default)]
    pub spikes: Vec<Reading>,

    /// Readings the server classified as lows
    #[serde(default, rename = "isPickLow")]
    pub lows: Vec<Reading>,

    /// Sources available for this user
    #[serde(default)]
    pub glucose_sources: Vec<String>,

    /// Source the server selected for this response
    #[serde(default, rename = "glucoseSourceChoosed")]
    pub source_label: String,

    #[serde(default)]
    pub score: Vec<ScoreSample>,

    #[serde(default)]
    pub events: Vec<serde_json::Value>,

    /// IANA timezone reported by the session, may be empty
    #[serde(default)]
    pub timezone: String,

    #[serde(default)]
    pub max_glucose: f64,
}

impl DaySeries {
    /// Build a series from the three reading categories only
    pub fn from_parts(data: Vec<Reading>, spikes: Vec<Reading>, lows: Vec<Reading>) -> Self {
        DaySeries {
            data,
            spikes,
            lows,
            ..Default::default()
        }
    }

    /// Baseline, spikes and lows are jointly empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.spikes.is_empty() && self.lows.is_empty()
    }

    /// Total number of readings across the three categories
    pub fn len(&self) -> usize {
        self.data.len() + self.spikes.len() + self.lows.len()
    }
}

/// Rolling lookback durations offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollingWindow {
    #[serde(rename = "6")]
    SixHours,
    #[serde(rename = "12")]
    TwelveHours,
    #[serde(rename = "24")]
    TwentyFourHours,
}

impl RollingWindow {
    pub fn hours(&self) -> i64 {
        match self {
            RollingWindow::SixHours => 6,
            RollingWindow::TwelveHours => 12,
            RollingWindow::TwentyFourHours => 24,
        }
    }

    /// Spacing between time-axis labels
    pub fn interval_minutes(&self) -> i64 {
        match self {
            RollingWindow::SixHours => 15,
            RollingWindow::TwelveHours => 30,
            RollingWindow::TwentyFourHours => 60,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RollingWindow::SixHours => "6h",
            RollingWindow::TwelveHours => "12h",
            RollingWindow::TwentyFourHours => "24h",
        }
    }

    pub fn from_hours(hours: u32) -> Option<Self> {
        match hours {
            6 => Some(RollingWindow::SixHours),
            12 => Some(RollingWindow::TwelveHours),
            24 => Some(RollingWindow::TwentyFourHours),
            _ => None,
        }
    }
}

impl std::str::FromStr for RollingWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hours = s.trim().trim_end_matches(['h', 'H']);
        hours
            .parse::<u32>()
            .ok()
            .and_then(RollingWindow::from_hours)
            .ok_or_else(|| format!("Invalid window: {} (expected 6, 12 or 24)", s))
    }
}

/// Which readings are in scope: a rolling hour count or one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowSelector {
    Rolling(RollingWindow),
    Custom(NaiveDate),
}

impl WindowSelector {
    pub fn label(&self) -> &'static str {
        match self {
            WindowSelector::Rolling(window) => window.label(),
            WindowSelector::Custom(_) => "Otro",
        }
    }
}

impl std::fmt::Display for WindowSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowSelector::Rolling(window) => write!(f, "{}", window.label()),
            WindowSelector::Custom(date) => write!(f, "custom ({})", date),
        }
    }
}

/// Display-ready projection of a reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub value: f64,

    /// ISO timestamp of the source reading, as sent by the server
    pub date: String,

    /// Resolved instant of the reading, epoch first
    pub timestamp: Option<DateTime<Utc>>,

    /// Value as shown next to the point
    pub text: String,

    pub band: GlucoseBand,

    /// Hex color derived from `band`
    pub color: &'static str,

    /// Point radius, larger when selected
    pub radius: u32,

    /// Vertical strip drawn under the selected point
    pub show_strip: bool,
    pub strip_height: u32,

    /// Retained by the downsampler as statistically significant or flagged
    pub important: bool,
}

/// Aggregate over the full merged series of one fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub min: f64,
    pub max: f64,

    /// Mean rounded to the nearest integer
    pub average: i64,

    pub spike_count: usize,
    pub low_count: usize,
}
