//! Session, tokens and the auth backend.

pub mod client;
pub mod error;
pub mod reset;
pub mod session;
pub mod token;
pub mod types;
pub mod validation;

pub use client::{AuthApi, HttpAuthClient};
pub use error::AuthError;
pub use reset::{PasswordResetFlow, ResetStep};
pub use session::{AuthContext, AuthSession, Navigation, SessionPhase, SessionState, STATUS_QUERY};
pub use token::{
    refresh_delay, AccessToken, RefreshEvent, RefreshListener, RefreshScheduler, TokenKind,
    TokenStore, MIN_REFRESH_DELAY,
};
pub use types::{
    AccountStatus, AuthStatusResponse, ForgotPasswordResponse, LoginRequest, LoginResponse,
    OnboardingStep, ResetPasswordResponse, SuccessResponse, TokenResponse, User,
};
pub use validation::{FieldError, ValidationErrors};
