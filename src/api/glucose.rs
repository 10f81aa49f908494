use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::auth::Credentials;
use crate::error::FetchError;
use crate::fallback::DaySource;
use crate::logging::redact_bearer;
use crate::models::DaySeries;

#[derive(Debug, Serialize)]
struct GlucoseRequest {
    date: String,
}

/// Response envelope of the glucose endpoint
#[derive(Debug, Deserialize)]
struct GlucoseEnvelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    success: bool,
    data: Option<DaySeries>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerMessage {
    message: Option<String>,
}

/// Interpret a glucose reply for `date`.
///
/// 401 and 404 map to their own kinds; any other failure keeps the server's
/// message when the body carries one.
pub fn decode_glucose_response(
    date: NaiveDate,
    status: u16,
    body: &str,
) -> std::result::Result<DaySeries, FetchError> {
    match status {
        401 => return Err(FetchError::Unauthorized),
        404 => return Err(FetchError::NoDataForDay { date }),
        200..=299 => {}
        _ => {
            let message = serde_json::from_str::<ServerMessage>(body)
                .unwrap_or_default()
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Server returned status {}", status));
            return Err(FetchError::NetworkOrServer {
                status: Some(status),
                message,
            });
        }
    }

    let envelope: GlucoseEnvelope = serde_json::from_str(body).map_err(|e| FetchError::Decode {
        reason: e.to_string(),
    })?;

    if !envelope.success {
        let message = if envelope.message.is_empty() {
            "Failed to fetch glucose data".to_string()
        } else {
            envelope.message
        };
        return Err(FetchError::NetworkOrServer {
            status: Some(status),
            message,
        });
    }

    envelope.data.ok_or_else(|| FetchError::Decode {
        reason: "response has no data section".to_string(),
    })
}

/// Client of the per-day glucose endpoint
#[derive(Debug, Clone)]
pub struct GlucoseApi {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    redact_logs: bool,
}

impl GlucoseApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, credentials: Credentials) -> Self {
        GlucoseApi {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            redact_logs: true,
        }
    }

    /// Turn bearer-token masking in request logs on or off. With masking
    /// off the authorization header is logged verbatim at trace level.
    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact_logs = redact;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/api/glucose/getByUserAndDateRange?userId={}",
            self.base_url, self.credentials.user_id
        )
    }

    #[instrument(skip(self), fields(user_id = %self.credentials.user_id))]
    pub async fn get_glucose_data(&self, date: NaiveDate) -> std::result::Result<DaySeries, FetchError> {
        let authorization = self.credentials.authorization();
        if self.redact_logs {
            debug!(authorization = %redact_bearer(&authorization), "Sending glucose request");
        } else {
            tracing::trace!(%authorization, "Sending glucose request");
        }

        let response = self
            .client
            .post(self.url())
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&GlucoseRequest {
                date: date.format("%Y-%m-%d").to_string(),
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Glucose request failed");
                FetchError::NetworkOrServer {
                    status: e.status().map(|s| s.as_u16()),
                    message: e.to_string(),
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| FetchError::NetworkOrServer {
            status: Some(status),
            message: e.to_string(),
        })?;

        let series = decode_glucose_response(date, status, &body)?;
        debug!(
            data = series.data.len(),
            spikes = series.spikes.len(),
            lows = series.lows.len(),
            source = %series.source_label,
            "Glucose response decoded"
        );
        Ok(series)
    }
}

impl DaySource for GlucoseApi {
    async fn fetch_day(&self, date: NaiveDate) -> std::result::Result<DaySeries, FetchError> {
        self.get_glucose_data(date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
    }

    #[test]
    fn test_redaction_defaults_on() {
        let credentials =
            Credentials::from_parts(Some("abc.def.ghi".into()), Some("u1".into())).unwrap();
        let api = GlucoseApi::new(reqwest::Client::new(), "https://api.test/", credentials);
        assert!(api.redact_logs);
        assert_eq!(
            api.url(),
            "https://api.test/api/glucose/getByUserAndDateRange?userId=u1"
        );
        assert!(!api.with_redaction(false).redact_logs);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            decode_glucose_response(date(), 401, ""),
            Err(FetchError::Unauthorized)
        ));
        assert!(matches!(
            decode_glucose_response(date(), 404, ""),
            Err(FetchError::NoDataForDay { .. })
        ));
    }

    #[test]
    fn test_server_message_surfaced() {
        let err = decode_glucose_response(date(), 500, r#"{"message":"Mongo timeout"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Mongo timeout");

        let err = decode_glucose_response(date(), 503, "gateway down").unwrap_err();
        assert_eq!(err.to_string(), "Server returned status 503");
    }

    #[test]
    fn test_unsuccessful_envelope() {
        let body = r#"{"code":200,"message":"","success":false,"data":null}"#;
        let err = decode_glucose_response(date(), 200, body).unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch glucose data");
    }

    #[test]
    fn test_successful_envelope() {
        let body = r#"{
            "code": 200, "message": "ok", "success": true,
            "data": {
                "data": [{"source":"libre","date":"2025-01-09T10:00:00.000Z","dateUnix":1736416800,
                          "value":65,"historic":true,"isSpike":false,"averaged":false,"isPickLow":false}],
                "spikes": [], "isPickLow": [],
                "glucoseSources": ["libre"], "glucoseSourceChoosed": "libre",
                "score": [], "events": [], "timezone": "America/Caracas", "maxGlucose": 65
            },
            "i18n": "es", "global": {"es": ""}
        }"#;
        let series = decode_glucose_response(date(), 200, body).unwrap();
        assert_eq!(series.data.len(), 1);
        assert_eq!(series.data[0].value, 65.0);
        assert!(series.data[0].historic);
        assert_eq!(series.timezone, "America/Caracas");
    }

    #[test]
    fn test_garbage_body_is_decode_error() {
        assert!(matches!(
            decode_glucose_response(date(), 200, "not json"),
            Err(FetchError::Decode { .. })
        ));
    }
}
