//! Unified error hierarchy for glucoview
//!
//! Provides a structured error type system that separates gateway failures
//! (which drive the fallback search) from configuration and local errors,
//! with severity mapping into the tracing system.

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level error type for all glucoview operations
#[derive(Debug, Error)]
pub enum GlucoseError {
    /// Remote gateway errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Authentication gateway errors
    #[error("Login failed: {0}")]
    Auth(#[from] AuthError),

    /// The session has no bearer credential or user identity
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Every day of the lookback came back empty
    #[error("No glucose data available in the {days} days up to {start}")]
    ExhaustedLookback { start: NaiveDate, days: u32 },

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by a single calendar-day request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credential expired, rejected or missing
    #[error("Unauthorized: please check your authentication token")]
    Unauthorized,

    /// The server has no readings for the requested day
    #[error("No glucose data found for {date}")]
    NoDataForDay { date: NaiveDate },

    /// Transport failure or non-success server reply, message kept verbatim
    #[error("{message}")]
    NetworkOrServer {
        status: Option<u16>,
        message: String,
    },

    /// Response body did not match the expected envelope
    #[error("Could not decode glucose response: {reason}")]
    Decode { reason: String },
}

/// Error reported by the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{title}: {message}")]
pub struct AuthError {
    pub title: String,
    pub message: String,
    pub code: Option<String>,
}

/// Result type alias for glucoview operations
pub type Result<T> = std::result::Result<T, GlucoseError>;

impl FetchError {
    /// Whether the fallback search may move on to the previous day
    pub fn advances_fallback(&self) -> bool {
        !matches!(self, FetchError::Unauthorized)
    }
}

impl GlucoseError {
    /// Check if the same request can reasonably be repeated
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GlucoseError::Fetch(FetchError::NetworkOrServer { .. }) | GlucoseError::Io(_)
        )
    }

    /// True when the caller must re-authenticate before anything else
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            GlucoseError::Fetch(FetchError::Unauthorized) | GlucoseError::MissingCredential(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GlucoseError::Fetch(FetchError::NoDataForDay { .. }) => ErrorSeverity::Info,
            GlucoseError::ExhaustedLookback { .. } => ErrorSeverity::Warning,
            GlucoseError::Validation(_) => ErrorSeverity::Warning,
            GlucoseError::Fetch(FetchError::Unauthorized) => ErrorSeverity::Error,
            GlucoseError::MissingCredential(_) => ErrorSeverity::Error,
            GlucoseError::Auth(_) => ErrorSeverity::Error,
            GlucoseError::Configuration(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            GlucoseError::Fetch(FetchError::Unauthorized) | GlucoseError::MissingCredential(_) => {
                "Your session is not authorized. Please log in again.".to_string()
            }
            GlucoseError::Fetch(FetchError::NoDataForDay { date }) => {
                format!("No glucose data for {}.", date)
            }
            GlucoseError::ExhaustedLookback { days, .. } => {
                format!(
                    "No glucose data available in the last {} days. Please check your monitoring device.",
                    days
                )
            }
            GlucoseError::Auth(e) => e.message.clone(),
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical error, nothing can proceed
    Critical,
    /// Error that prevents the operation
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Expected condition
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
