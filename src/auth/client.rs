//! Auth backend client
//!
//! [`AuthApi`] is the seam between the session logic and the backend. The
//! production implementation, [`HttpAuthClient`], shares one cookie-aware
//! `reqwest::Client`, attaches the in-memory bearer token to every
//! non-public request and sends a CSRF token on mutating calls.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::error::AuthError;
use super::token::TokenStore;
use super::types::{
    AuthStatusResponse, ForgotPasswordResponse, LoginRequest, LoginResponse,
    ResetPasswordResponse, SuccessResponse, TokenResponse,
};
use crate::config::{AuthEndpoints, HostConfig};

const CSRF_HEADER: &str = "x-csrf-token";

/// Auth backend operations
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Public; never carries a bearer token
    async fn status(&self) -> Result<AuthStatusResponse, AuthError>;
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError>;
    async fn logout(&self) -> Result<(), AuthError>;
    async fn logout_all(&self) -> Result<(), AuthError>;
    /// Issues a reset-session token
    async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordResponse, AuthError>;
    async fn resend_reset_otp(&self) -> Result<SuccessResponse, AuthError>;
    async fn verify_reset_otp(&self, otp: &str) -> Result<SuccessResponse, AuthError>;
    async fn reset_password(&self, new_password: &str)
        -> Result<ResetPasswordResponse, AuthError>;
    async fn refresh(&self) -> Result<TokenResponse, AuthError>;

    /// Drop per-session client state (CSRF token and the like)
    fn clear_local_state(&self) {}
}

// ---------------------------------------------------------------------------
// Error bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<ErrorMessage>,
}

/// Message shown for a failed response: the body's `message` (joined when it
/// is a list), else the status reason
fn server_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    let from_body = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .map(|m| match m {
            ErrorMessage::One(message) => message,
            ErrorMessage::Many(messages) => messages.join(", "),
        })
        .filter(|m| !m.is_empty());

    from_body.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    })
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpAuthClient {
    http: Client,
    base: Url,
    endpoints: AuthEndpoints,
    tokens: TokenStore,
    csrf_enabled: bool,
    csrf: Mutex<Option<String>>,
}

impl HttpAuthClient {
    pub fn new(config: &HostConfig, tokens: TokenStore) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self::with_client(http, config, tokens))
    }

    pub fn with_client(http: Client, config: &HostConfig, tokens: TokenStore) -> Self {
        Self {
            http,
            base: config.api_base_url.clone(),
            endpoints: config.endpoints.clone(),
            tokens,
            csrf_enabled: config.csrf_enabled,
            csrf: Mutex::new(None),
        }
    }

    /// Endpoint URL; leading slashes are dropped so paths stay under the base
    fn url(&self, path: &str) -> Result<Url, AuthError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|source| AuthError::Endpoint {
                path: path.to_string(),
                source,
            })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn csrf_token(&self) -> Option<String> {
        if !self.csrf_enabled {
            return None;
        }
        let cached = self.csrf.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if cached.is_some() {
            return cached;
        }

        match self.fetch_csrf_token().await {
            Ok(token) => {
                *self.csrf.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
                Some(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "CSRF token unavailable, sending request without it");
                None
            }
        }
    }

    async fn fetch_csrf_token(&self) -> Result<String, AuthError> {
        let endpoint = &self.endpoints.csrf;
        let body: Value = self
            .send(self.http.get(self.url(endpoint)?), endpoint)
            .await
            .map(|bytes| serde_json::from_slice(&bytes).unwrap_or(Value::Null))?;
        body.get("csrfToken")
            .or_else(|| body.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::Decode {
                endpoint: endpoint.clone(),
                reason: "no csrfToken in response".to_string(),
            })
    }

    /// Send and check the status; returns the raw body of a 2xx response
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Vec<u8>, AuthError> {
        let response: Response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = server_message(status, &body);
            tracing::warn!(endpoint, status = status.as_u16(), message = %message, "Auth request failed");
            return Err(AuthError::Server {
                status: status.as_u16(),
                message,
            });
        }
        tracing::debug!(endpoint, status = status.as_u16(), "Auth request ok");
        Ok(body.to_vec())
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, AuthError> {
        serde_json::from_slice(body).map_err(|e| AuthError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let bytes = self.post_raw(endpoint, body).await?;
        Self::decode(endpoint, &bytes)
    }

    async fn post_raw<B>(&self, endpoint: &str, body: &B) -> Result<Vec<u8>, AuthError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let mut request = self.authorize(self.http.post(self.url(endpoint)?).json(body));
        if let Some(csrf) = self.csrf_token().await {
            request = request.header(CSRF_HEADER, csrf);
        }
        self.send(request, endpoint).await
    }
}

#[async_trait]
impl AuthApi for HttpAuthClient {
    async fn status(&self) -> Result<AuthStatusResponse, AuthError> {
        let endpoint = &self.endpoints.status;
        let bytes = self.send(self.http.get(self.url(endpoint)?), endpoint).await?;
        Self::decode(endpoint, &bytes)
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        self.post(&self.endpoints.login, request).await
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.post_raw(&self.endpoints.logout, &json!({})).await.map(|_| ())
    }

    async fn logout_all(&self) -> Result<(), AuthError> {
        self.post_raw(&self.endpoints.logout_all, &json!({})).await.map(|_| ())
    }

    async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordResponse, AuthError> {
        self.post(&self.endpoints.forgot_password, &json!({ "email": email }))
            .await
    }

    async fn resend_reset_otp(&self) -> Result<SuccessResponse, AuthError> {
        self.post(&self.endpoints.resend_reset_otp, &json!({})).await
    }

    async fn verify_reset_otp(&self, otp: &str) -> Result<SuccessResponse, AuthError> {
        self.post(&self.endpoints.verify_reset_otp, &json!({ "otp": otp }))
            .await
    }

    async fn reset_password(
        &self,
        new_password: &str,
    ) -> Result<ResetPasswordResponse, AuthError> {
        self.post(
            &self.endpoints.reset_password,
            &json!({ "newPassword": new_password }),
        )
        .await
    }

    async fn refresh(&self) -> Result<TokenResponse, AuthError> {
        self.post(&self.endpoints.refresh, &json!({})).await
    }

    fn clear_local_state(&self) {
        self.csrf.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageLocation;
    use reqwest::StatusCode;

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(
            server_message(StatusCode::BAD_REQUEST, br#"{"message":"Invalid OTP"}"#),
            "Invalid OTP"
        );
        assert_eq!(
            server_message(
                StatusCode::BAD_REQUEST,
                br#"{"message":["email must be an email","otp too short"]}"#
            ),
            "email must be an email, otp too short"
        );
        assert_eq!(server_message(StatusCode::NOT_FOUND, b"<html>"), "Not Found");
    }

    #[test]
    fn test_endpoint_urls_stay_under_base() {
        let page = PageLocation::parse("https://app.vrittiai.com").unwrap();
        let config = HostConfig::for_page(page);
        let client = HttpAuthClient::new(&config, TokenStore::new()).unwrap();

        assert_eq!(
            client.url("cloud-api/auth/status").unwrap().as_str(),
            "https://app.vrittiai.com/api/cloud-api/auth/status"
        );
        assert_eq!(
            client.url("/csrf/token").unwrap().as_str(),
            "https://app.vrittiai.com/api/csrf/token"
        );
    }
}
