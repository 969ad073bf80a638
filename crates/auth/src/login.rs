//! Service-account login against the upstream partner API.
//!
//! `POST {base_url}/{api_prefix}/{login_path}` with `{"email", "password"}`;
//! a successful response carries `{"token": "...", "expires_in"?: <secs>}`.

use arc_swap::ArcSwap;
use partnergate_config::{Config, ServiceConfig};
use partnergate_types::{AuthError, join_url, unix_now};
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{Value, json};
use std::sync::Arc;

/// Service email/password, with the password kept out of `Debug` output.
#[derive(Debug, Clone)]
pub struct ServiceCredentials {
    pub email: String,
    pub password: SecretString,
}

impl ServiceCredentials {
    /// Extract credentials from the service section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredentials`] if either value is unset or empty.
    pub fn from_config(service: &ServiceConfig) -> Result<Self, AuthError> {
        match (service.email.as_deref(), service.password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok(Self {
                    email: email.to_string(),
                    password: SecretString::from(password),
                })
            }
            _ => Err(AuthError::MissingCredentials),
        }
    }
}

/// A token issued by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    /// Absolute expiry derived from `expires_in`, if the upstream sent one.
    pub expires_at: Option<u64>,
}

/// Performs the service-account login request.
///
/// Configuration is read per call, so hot-reloaded credentials and base URLs
/// take effect on the next renewal.
#[derive(Clone)]
pub struct ServiceLogin {
    http: reqwest::Client,
    config: Arc<ArcSwap<Config>>,
}

impl ServiceLogin {
    #[must_use]
    pub fn new(http: reqwest::Client, config: Arc<ArcSwap<Config>>) -> Self {
        Self { http, config }
    }

    /// Authenticate with the configured service credentials.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingCredentials`] when email/password are not configured.
    /// - [`AuthError::Transport`] when no response was received.
    /// - [`AuthError::Rejected`] on a non-2xx status, carrying the upstream message.
    /// - [`AuthError::MissingToken`] when a 2xx body has no `token`.
    pub async fn login(&self) -> Result<LoginGrant, AuthError> {
        let config = self.config.load();
        let creds = ServiceCredentials::from_config(&config.service)?;
        let url = join_url(
            &join_url(&config.upstream.base_url, &config.upstream.api_prefix),
            &config.upstream.login_path,
        );

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(config.upstream.timeout())
            .json(&json!({
                "email": creds.email,
                "password": creds.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = rejection_message(status.as_u16(), &text);
            tracing::error!(status = status.as_u16(), url = %url, message = %message, "service login rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|_| AuthError::MissingToken)?;
        parse_grant(&body)
    }
}

/// Pull the token and optional lifetime out of a login response body.
///
/// # Errors
///
/// Returns [`AuthError::MissingToken`] if `token` is absent or not a non-empty string.
pub fn parse_grant(body: &Value) -> Result<LoginGrant, AuthError> {
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    let expires_at = body
        .get("expires_in")
        .and_then(Value::as_u64)
        .filter(|secs| *secs > 0)
        .map(|secs| unix_now().saturating_add(secs));
    Ok(LoginGrant {
        token: token.to_string(),
        expires_at,
    })
}

fn rejection_message(status: u16, text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| format!("HTTP Error: {status}"))
}
