//! Remote gateways for the habits API
//!
//! Two endpoints are used: `/login` to obtain a bearer credential and
//! `/api/glucose/getByUserAndDateRange` to fetch one calendar day of
//! readings. Response decoding is kept separate from transport so it can be
//! exercised without a server.

pub mod auth;
pub mod glucose;

use std::time::Duration;

use crate::config::ApiSettings;
use crate::error::{GlucoseError, Result};

pub use auth::{AuthApi, AuthUser, Credentials, Session};
pub use glucose::GlucoseApi;

pub const DEFAULT_BASE_URL: &str = "https://qa-api.habitsapi.com";

/// Build the shared HTTP client from the API settings
pub fn build_client(settings: &ApiSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .user_agent(concat!("glucoview/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GlucoseError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
