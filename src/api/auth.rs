use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument, warn};

use crate::error::{AuthError, GlucoseError, Result};
use crate::logging::redact_bearer;

const INVALID_CREDENTIALS: &str = "Credenciales inválidas. Verifica tu email y contraseña.";

/// Bearer credential plus the user it belongs to
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    pub user_id: String,
}

impl Credentials {
    /// Both parts are required; there is no fallback credential.
    pub fn from_parts(token: Option<String>, user_id: Option<String>) -> Result<Self> {
        let token = token
            .map(|t| strip_bearer(&t).to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GlucoseError::MissingCredential("no bearer token in session".to_string()))?;
        let user_id = user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GlucoseError::MissingCredential("no user id in session".to_string()))?;

        Ok(Credentials { token, user_id })
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &redact_bearer(&self.token))
            .field("user_id", &self.user_id)
            .finish()
    }
}

fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    match token.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        None if token.eq_ignore_ascii_case("bearer") => "",
        _ => token,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub user: String,
    pub email: String,
    pub survey_start: bool,
}

/// Outcome of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: AuthUser,
}

impl Session {
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::from_parts(Some(self.token.clone()), Some(self.user.id.clone()))
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    mail: &'a str,
    pass: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    survey_start: bool,
    token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    title: Option<String>,
    message: Option<String>,
}

/// Interpret a login reply
pub fn decode_login_response(status: u16, body: &str) -> std::result::Result<Session, AuthError> {
    if (200..300).contains(&status) {
        let parsed: LoginResponse = serde_json::from_str(body).map_err(|e| AuthError {
            title: "Error Inesperado".to_string(),
            message: format!("Respuesta de login inválida: {}", e),
            code: None,
        })?;

        return Ok(Session {
            token: parsed.token,
            user: AuthUser {
                id: parsed.id,
                user: parsed.user,
                email: parsed.email,
                survey_start: parsed.survey_start,
            },
        });
    }

    let body: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let (title, message) = match body.error {
        Some(detail) => (
            detail.title.unwrap_or_else(|| "Error".to_string()),
            detail
                .message
                .or(body.message)
                .unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
        ),
        None => (
            "Error".to_string(),
            body.message.unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
        ),
    };

    Err(AuthError {
        title,
        message,
        code: Some(status.to_string()),
    })
}

fn connection_error() -> AuthError {
    AuthError {
        title: "Error de Conexión".to_string(),
        message: "Error de conexión. Verifica tu conexión a internet.".to_string(),
        code: Some("NETWORK_ERROR".to_string()),
    }
}

/// Client of the `/login` endpoint
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl AuthApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        AuthApi {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> std::result::Result<Session, AuthError> {
        let url = format!("{}/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                mail: email,
                pass: password,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Login request failed");
                connection_error()
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|_| connection_error())?;

        let session = decode_login_response(status, &body)?;
        info!(user_id = %session.user.id, "Logged in");
        Ok(session)
    }
}
