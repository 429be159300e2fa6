//! Password Reset Flow
//!
//! ```text
//! Email --forgot ok--> Otp --verify ok--> Reset --reset ok--> Complete
//!                       |  ^ resend
//!                       +--go_back--> Email
//! ```
//!
//! The forgot-password call issues a reset-session token which authorizes the
//! resend, verify and reset calls. Reset tokens are never refreshed. A
//! successful reset replaces it with a normal session token and asks the
//! caller for a full reload. Backing out of `Otp` drops the reset token
//! locally without a server call; the server session expires on its own.

use std::sync::Arc;
use std::time::Duration;

use super::client::AuthApi;
use super::error::AuthError;
use super::session::Navigation;
use super::token::{RefreshScheduler, TokenKind, TokenStore};
use super::types::SuccessResponse;
use super::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStep {
    Email,
    Otp,
    Reset,
    Complete,
}

impl ResetStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetStep::Email => "email",
            ResetStep::Otp => "otp",
            ResetStep::Reset => "reset",
            ResetStep::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ResetStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct PasswordResetFlow {
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    refresh: RefreshScheduler,
    step: ResetStep,
    email: String,
    /// Inline error of the last submission
    error: Option<String>,
    /// Server message of the last successful submission
    notice: Option<String>,
}

impl PasswordResetFlow {
    pub fn new(api: Arc<dyn AuthApi>, tokens: TokenStore, refresh: RefreshScheduler) -> Self {
        Self {
            api,
            tokens,
            refresh,
            step: ResetStep::Email,
            email: String::new(),
            error: None,
            notice: None,
        }
    }

    pub fn step(&self) -> ResetStep {
        self.step
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Step 1: request a reset code for `email`
    pub async fn submit_email(&mut self, email: &str) -> Result<(), AuthError> {
        self.expect_step("submit_email", ResetStep::Email)?;
        let email = email.trim();
        let result = match validation::validate_email(email) {
            Ok(()) => self.api.forgot_password(email).await,
            Err(errors) => Err(errors.into()),
        };
        let response = self.record(result)?;
        if !response.success {
            return self.reject(response.message);
        }

        self.email = email.to_string();
        if let Some(token) = &response.access_token {
            self.refresh.cancel();
            self.tokens.set(
                token,
                TokenKind::Reset,
                response.expires_in.map(Duration::from_secs),
            );
        }
        tracing::info!(step = %ResetStep::Otp, "Reset code requested");
        self.notice = Some(response.message);
        self.step = ResetStep::Otp;
        Ok(())
    }

    /// Re-issue the code under the same reset session
    pub async fn resend_otp(&mut self) -> Result<SuccessResponse, AuthError> {
        self.expect_step("resend_otp", ResetStep::Otp)?;
        let result = self.api.resend_reset_otp().await;
        let response = self.record(result)?;
        if !response.success {
            return self.reject(response.message);
        }
        self.notice = Some(response.message.clone());
        Ok(response)
    }

    /// Step 2: verify the 6-digit code
    pub async fn verify_otp(&mut self, code: &str) -> Result<(), AuthError> {
        self.expect_step("verify_otp", ResetStep::Otp)?;
        let result = match validation::validate_otp(code) {
            Ok(()) => self.api.verify_reset_otp(code).await,
            Err(errors) => Err(errors.into()),
        };
        let response = self.record(result)?;
        if !response.success {
            return self.reject(response.message);
        }
        tracing::info!(step = %ResetStep::Reset, "Reset code verified");
        self.notice = Some(response.message);
        self.step = ResetStep::Reset;
        Ok(())
    }

    /// Back from `Otp` to `Email`. Returns whether the step changed.
    pub fn go_back(&mut self) -> bool {
        if self.step != ResetStep::Otp {
            return false;
        }
        if self.tokens.kind() == Some(TokenKind::Reset) {
            self.tokens.clear();
        }
        self.step = ResetStep::Email;
        self.error = None;
        self.notice = None;
        true
    }

    /// Step 3: set the new password; on success the caller reloads to `/`
    pub async fn reset_password(
        &mut self,
        password: &str,
        confirm: &str,
    ) -> Result<Navigation, AuthError> {
        self.expect_step("reset_password", ResetStep::Reset)?;
        let result = match validation::validate_new_password(password, confirm) {
            Ok(()) => self.api.reset_password(password).await,
            Err(errors) => Err(errors.into()),
        };
        let response = self.record(result)?;
        if !response.success {
            return self.reject(response.message);
        }

        let expires_in = Duration::from_secs(response.expires_in);
        self.tokens
            .set(&response.access_token, TokenKind::Session, Some(expires_in));
        self.refresh.schedule(expires_in);
        tracing::info!("Password reset, new session stored");
        self.notice = Some(response.message);
        self.step = ResetStep::Complete;
        Ok(Navigation::home())
    }

    fn expect_step(&self, action: &'static str, expected: ResetStep) -> Result<(), AuthError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(AuthError::WrongStep {
                action,
                current: self.step.as_str(),
            })
        }
    }

    fn record<T>(&mut self, result: Result<T, AuthError>) -> Result<T, AuthError> {
        match &result {
            Ok(_) => self.error = None,
            Err(e) => {
                tracing::debug!(step = %self.step, error = %e, "Reset step failed");
                self.error = Some(e.inline_message());
            }
        }
        result
    }

    fn reject<T>(&mut self, message: String) -> Result<T, AuthError> {
        tracing::debug!(step = %self.step, message = %message, "Reset step rejected");
        self.error = Some(message.clone());
        Err(AuthError::Rejected(message))
    }
}
