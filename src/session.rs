//! Glucose session state
//!
//! [`GlucoseState`] is an immutable record; every change goes through
//! [`GlucoseState::reduce`], which returns the next record. Each fetch is
//! tagged with a generation number and a completion whose generation is no
//! longer the newest one is dropped, so the state always reflects the newest
//! request that has completed.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::error::{GlucoseError, Result};
use crate::fallback::{DaySource, FallbackOutcome, FallbackSearch};
use crate::models::{DaySeries, RollingWindow, WindowSelector};

pub const DEFAULT_TIMEZONE_NAME: &str = "America/Caracas";

/// Generation number identifying one fetch or fallback search
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct GlucoseState {
    /// Raw readings of the last committed fetch
    pub series: DaySeries,

    pub loading: bool,
    pub error: Option<String>,

    /// Day the raw series belongs to
    pub selected_date: NaiveDate,

    pub window: WindowSelector,

    /// Source chosen by the server or the user
    pub glucose_source: String,

    /// Session-reported timezone
    pub timezone: String,

    /// Newest generation started
    pub generation: Generation,
}

/// State transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetSelectedDate(NaiveDate),
    SetGlucoseSource(String),
    SetWindow(WindowSelector),
    FetchStarted,
    FetchSucceeded {
        generation: Generation,
        date: NaiveDate,
        series: DaySeries,
    },
    /// Fallback search found no day with data
    FetchExhausted {
        generation: Generation,
        message: String,
    },
    FetchFailed {
        generation: Generation,
        message: String,
    },
    ClearError,
    /// Back to the initial state for `today`, keeping the generation counter
    Reset { today: NaiveDate },
}

impl GlucoseState {
    pub fn new(today: NaiveDate) -> Self {
        GlucoseState {
            series: DaySeries::default(),
            loading: false,
            error: None,
            selected_date: today,
            window: WindowSelector::Rolling(RollingWindow::TwentyFourHours),
            glucose_source: String::new(),
            timezone: DEFAULT_TIMEZONE_NAME.to_string(),
            generation: 0,
        }
    }

    pub fn reduce(self, action: Action) -> GlucoseState {
        match action {
            Action::SetSelectedDate(date) => GlucoseState {
                selected_date: date,
                window: match self.window {
                    WindowSelector::Custom(_) => WindowSelector::Custom(date),
                    rolling => rolling,
                },
                ..self
            },
            Action::SetGlucoseSource(source) => GlucoseState {
                glucose_source: source,
                ..self
            },
            Action::SetWindow(window) => GlucoseState { window, ..self },
            Action::FetchStarted => GlucoseState {
                loading: true,
                error: None,
                generation: self.generation + 1,
                ..self
            },
            Action::FetchSucceeded {
                generation,
                date,
                series,
            } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "Dropping stale fetch result");
                    return self;
                }
                let timezone = if series.timezone.trim().is_empty() {
                    DEFAULT_TIMEZONE_NAME.to_string()
                } else {
                    series.timezone.clone()
                };
                GlucoseState {
                    glucose_source: series.source_label.clone(),
                    timezone,
                    series,
                    loading: false,
                    error: None,
                    selected_date: date,
                    window: match self.window {
                        WindowSelector::Custom(_) => WindowSelector::Custom(date),
                        rolling => rolling,
                    },
                    ..self
                }
            }
            Action::FetchExhausted {
                generation,
                message,
            } => {
                if generation != self.generation {
                    return self;
                }
                GlucoseState {
                    series: DaySeries::default(),
                    loading: false,
                    error: Some(message),
                    ..self
                }
            }
            Action::FetchFailed {
                generation,
                message,
            } => {
                if generation != self.generation {
                    return self;
                }
                GlucoseState {
                    loading: false,
                    error: Some(message),
                    ..self
                }
            }
            Action::ClearError => GlucoseState { error: None, ..self },
            Action::Reset { today } => GlucoseState {
                generation: self.generation,
                ..GlucoseState::new(today)
            },
        }
    }
}

/// Shared holder of the current state record
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<Mutex<Arc<GlucoseState>>>,
}

impl SessionStore {
    pub fn new(initial: GlucoseState) -> Self {
        SessionStore {
            state: Arc::new(Mutex::new(Arc::new(initial))),
        }
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> Arc<GlucoseState> {
        match self.state.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Apply an action and return the resulting state
    pub fn dispatch(&self, action: Action) -> Arc<GlucoseState> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new((**guard).clone().reduce(action));
        *guard = Arc::clone(&next);
        next
    }

    /// Start a new fetch, superseding any in flight
    pub fn begin_fetch(&self) -> Generation {
        self.dispatch(Action::FetchStarted).generation
    }
}

/// Ties a day source, the fallback search and the store together
pub struct GlucoseSession<S> {
    source: S,
    store: SessionStore,
    search: FallbackSearch,
}

impl<S: DaySource> GlucoseSession<S> {
    pub fn new(source: S, store: SessionStore, search: FallbackSearch) -> Self {
        GlucoseSession {
            source,
            store,
            search,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Load exactly one day, without fallback
    #[instrument(skip(self))]
    pub async fn load_for_date(&self, date: NaiveDate) -> Result<Arc<GlucoseState>> {
        self.store.dispatch(Action::SetSelectedDate(date));
        let generation = self.store.begin_fetch();

        match self.source.fetch_day(date).await {
            Ok(series) => Ok(self.store.dispatch(Action::FetchSucceeded {
                generation,
                date,
                series,
            })),
            Err(e) => {
                self.store.dispatch(Action::FetchFailed {
                    generation,
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Switch to a custom date and search backwards from it
    pub async fn load_with_fallback(&self, start: NaiveDate) -> Result<FallbackOutcome> {
        self.store.dispatch(Action::SetWindow(WindowSelector::Custom(start)));
        self.search_from(start).await
    }

    /// Switch to a rolling window; the search always starts today
    pub async fn load_for_window(&self, window: RollingWindow, today: NaiveDate) -> Result<FallbackOutcome> {
        self.store.dispatch(Action::SetWindow(WindowSelector::Rolling(window)));
        self.search_from(today).await
    }

    async fn search_from(&self, start: NaiveDate) -> Result<FallbackOutcome> {
        let generation = self.store.begin_fetch();

        match self.search.run(&self.source, start).await {
            Ok(outcome) => {
                match &outcome {
                    FallbackOutcome::Found { date, series, .. } => {
                        info!(%date, generation, "Committing glucose data");
                        self.store.dispatch(Action::FetchSucceeded {
                            generation,
                            date: *date,
                            series: series.clone(),
                        });
                    }
                    FallbackOutcome::Exhausted { attempts, .. } => {
                        let err = GlucoseError::ExhaustedLookback {
                            start,
                            days: attempts.len() as u32,
                        };
                        self.store.dispatch(Action::FetchExhausted {
                            generation,
                            message: err.user_message(),
                        });
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                self.store.dispatch(Action::FetchFailed {
                    generation,
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }
}
