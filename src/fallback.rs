//! Day-by-day backward search for the most recent date with readings
//!
//! The search is a plain driver loop over a lazy sequence of candidate dates
//! ([`CandidateDays`]). Each candidate is fetched from a [`DaySource`] and
//! evaluated before the next one is requested, so there is never more than
//! one request in flight and the most recent non-empty day always wins.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{FetchError, GlucoseError, Result};
use crate::models::DaySeries;

/// Default number of calendar days inspected, the start date included
pub const MAX_DAYS_BACK: u32 = 7;

/// Anything that can return the readings of one calendar day
#[allow(async_fn_in_trait)]
pub trait DaySource {
    async fn fetch_day(&self, date: NaiveDate) -> std::result::Result<DaySeries, FetchError>;
}

/// `start, start - 1, …` for at most `max_days` dates
#[derive(Debug, Clone)]
pub struct CandidateDays {
    next: Option<NaiveDate>,
    remaining: u32,
}

impl CandidateDays {
    pub fn new(start: NaiveDate, max_days: u32) -> Self {
        CandidateDays {
            next: Some(start),
            remaining: max_days,
        }
    }
}

impl Iterator for CandidateDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = current.checked_sub_signed(Duration::days(1));
        Some(current)
    }
}

/// What happened to one candidate day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DayOutcome {
    /// The day had readings
    Data { readings: usize },
    /// Server answered with an empty day or not-found
    Empty,
    /// Request failed; treated as empty unless the search aborts on errors
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAttempt {
    pub date: NaiveDate,
    pub outcome: DayOutcome,
}

/// Terminal state of a search
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    Found {
        date: NaiveDate,
        series: DaySeries,
        attempts: Vec<DayAttempt>,
    },
    Exhausted {
        start: NaiveDate,
        attempts: Vec<DayAttempt>,
    },
}

impl FallbackOutcome {
    /// Date to commit as the active selection, if any
    pub fn found_date(&self) -> Option<NaiveDate> {
        match self {
            FallbackOutcome::Found { date, .. } => Some(*date),
            FallbackOutcome::Exhausted { .. } => None,
        }
    }

    pub fn attempts(&self) -> &[DayAttempt] {
        match self {
            FallbackOutcome::Found { attempts, .. } | FallbackOutcome::Exhausted { attempts, .. } => {
                attempts
            }
        }
    }

    /// Convert exhaustion into the terminal error kind
    pub fn into_result(self) -> Result<(NaiveDate, DaySeries)> {
        match self {
            FallbackOutcome::Found { date, series, .. } => Ok((date, series)),
            FallbackOutcome::Exhausted { start, attempts } => Err(GlucoseError::ExhaustedLookback {
                start,
                days: attempts.len() as u32,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackSearch {
    pub max_days_back: u32,

    /// Stop at the first transport/server failure instead of moving on
    pub abort_on_transport_error: bool,
}

impl Default for FallbackSearch {
    fn default() -> Self {
        FallbackSearch {
            max_days_back: MAX_DAYS_BACK,
            abort_on_transport_error: false,
        }
    }
}

impl FallbackSearch {
    pub fn new(max_days_back: u32) -> Self {
        FallbackSearch {
            max_days_back,
            ..Default::default()
        }
    }

    pub async fn run<S: DaySource>(&self, source: &S, start: NaiveDate) -> Result<FallbackOutcome> {
        self.run_with_progress(source, start, |_, _| {}).await
    }

    /// Run the search, calling `on_attempt(date, days_back)` before each
    /// request.
    ///
    /// Unauthorized aborts immediately: every remaining day would be
    /// rejected with the same credential.
    #[instrument(skip(self, source, on_attempt), fields(max_days_back = self.max_days_back))]
    pub async fn run_with_progress<S, F>(
        &self,
        source: &S,
        start: NaiveDate,
        mut on_attempt: F,
    ) -> Result<FallbackOutcome>
    where
        S: DaySource,
        F: FnMut(NaiveDate, u32),
    {
        let mut attempts = Vec::new();

        for (days_back, date) in CandidateDays::new(start, self.max_days_back).enumerate() {
            on_attempt(date, days_back as u32);
            info!(%date, days_back, "Requesting glucose data");

            let outcome = match source.fetch_day(date).await {
                Ok(series) if !series.is_empty() => {
                    info!(%date, readings = series.len(), "Found glucose data");
                    attempts.push(DayAttempt {
                        date,
                        outcome: DayOutcome::Data {
                            readings: series.len(),
                        },
                    });
                    return Ok(FallbackOutcome::Found {
                        date,
                        series,
                        attempts,
                    });
                }
                Ok(_) | Err(FetchError::NoDataForDay { .. }) => {
                    info!(%date, "No data for day, trying previous day");
                    DayOutcome::Empty
                }
                Err(e) if !e.advances_fallback() => {
                    warn!(%date, error = %e, "Aborting fallback search");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(%date, error = %e, "Failed to load day");
                    if self.abort_on_transport_error {
                        return Err(e.into());
                    }
                    DayOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            };

            attempts.push(DayAttempt { date, outcome });
        }

        warn!(%start, days = attempts.len(), "No glucose data found in lookback");
        Ok(FallbackOutcome::Exhausted { start, attempts })
    }
}
