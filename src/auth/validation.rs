//! Client-side form validation
//!
//! Runs before any network call; a failing form never reaches the backend.
//! Messages match what the login and password-reset forms display.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

pub const MSG_INVALID_EMAIL: &str = "Invalid email address";
pub const MSG_PASSWORD_REQUIRED: &str = "Password is required";
pub const MSG_OTP_LENGTH: &str = "Code must be 6 digits";
pub const MSG_OTP_DIGITS: &str = "Code must contain only digits";
pub const MSG_PASSWORD_LENGTH: &str = "Password must be at least 8 characters";
pub const MSG_PASSWORD_UPPER: &str = "Must contain an uppercase letter";
pub const MSG_PASSWORD_LOWER: &str = "Must contain a lowercase letter";
pub const MSG_PASSWORD_DIGIT: &str = "Must contain a number";
pub const MSG_PASSWORD_SYMBOL: &str = "Must contain a special character";
pub const MSG_PASSWORD_MISMATCH: &str = "Passwords do not match";

const OTP_LENGTH: usize = 6;
const MIN_PASSWORD_LENGTH: usize = 8;

/// One failed rule on one form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every failed rule of a form submission, in rule order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First message for `field`, as a form shows under the input
    pub fn first(&self, field: &str) -> Option<&'static str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

fn is_email(value: &str) -> bool {
    match email_pattern() {
        Some(re) => re.is_match(value),
        None => value.contains('@'),
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if !is_email(email.trim()) {
        errors.push("email", MSG_INVALID_EMAIL);
    }
    errors.into_result()
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if !is_email(email.trim()) {
        errors.push("email", MSG_INVALID_EMAIL);
    }
    if password.is_empty() {
        errors.push("password", MSG_PASSWORD_REQUIRED);
    }
    errors.into_result()
}

/// Exactly six ASCII digits
pub fn validate_otp(code: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if code.chars().count() != OTP_LENGTH {
        errors.push("code", MSG_OTP_LENGTH);
    }
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) || code.len() != OTP_LENGTH {
        errors.push("code", MSG_OTP_DIGITS);
    }
    errors.into_result()
}

/// Password policy plus confirmation match
pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push("password", MSG_PASSWORD_LENGTH);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("password", MSG_PASSWORD_UPPER);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("password", MSG_PASSWORD_LOWER);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("password", MSG_PASSWORD_DIGIT);
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push("password", MSG_PASSWORD_SYMBOL);
    }
    if password != confirm {
        errors.push("confirmPassword", MSG_PASSWORD_MISMATCH);
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email(" a@b.com ").is_ok());
        let err = validate_email("not-an-email").unwrap_err();
        assert_eq!(err.first("email"), Some(MSG_INVALID_EMAIL));
    }

    #[test]
    fn test_login_requires_password() {
        let err = validate_login("a@b.com", "").unwrap_err();
        assert_eq!(err.first("password"), Some(MSG_PASSWORD_REQUIRED));
        assert_eq!(err.first("email"), None);
    }

    #[test]
    fn test_otp_messages() {
        assert!(validate_otp("123456").is_ok());
        assert_eq!(validate_otp("12345").unwrap_err().first("code"), Some(MSG_OTP_LENGTH));
        let letters = validate_otp("12a456").unwrap_err();
        assert_eq!(letters.errors().len(), 1);
        assert_eq!(letters.first("code"), Some(MSG_OTP_DIGITS));
    }

    #[test]
    fn test_password_rules_in_order() {
        let err = validate_new_password("abc", "abd").unwrap_err();
        let messages: Vec<&str> = err.errors().iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec![
                MSG_PASSWORD_LENGTH,
                MSG_PASSWORD_UPPER,
                MSG_PASSWORD_DIGIT,
                MSG_PASSWORD_SYMBOL,
                MSG_PASSWORD_MISMATCH,
            ]
        );
        assert!(validate_new_password("Secret#123", "Secret#123").is_ok());
    }

    #[test]
    fn test_mismatch_only() {
        let err = validate_new_password("Secret#123", "Secret#124").unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.first("confirmPassword"), Some(MSG_PASSWORD_MISMATCH));
    }

    proptest! {
        #[test]
        fn prop_six_digits_accepted(code in "[0-9]{6}") {
            prop_assert!(validate_otp(&code).is_ok());
        }

        #[test]
        fn prop_wrong_length_rejected(code in "[0-9]{0,5}|[0-9]{7,10}") {
            prop_assert!(validate_otp(&code).is_err());
        }

        #[test]
        fn prop_non_digit_rejected(prefix in "[0-9]{0,5}", bad in "[^0-9]", suffix in "[0-9]{0,5}") {
            let code = format!("{prefix}{bad}{suffix}");
            prop_assert!(validate_otp(&code).is_err());
        }

        #[test]
        fn prop_policy_compliant_passwords_accepted(
            upper in "[A-Z]{1,4}",
            lower in "[a-z]{1,4}",
            digit in "[0-9]{1,4}",
            symbol in "[!@#$%^&*]{1,4}",
        ) {
            let password = format!("{upper}{lower}{digit}{symbol}xx");
            prop_assert!(validate_new_password(&password, &password).is_ok());
        }

        #[test]
        fn prop_mismatch_always_rejected(password in "[A-Za-z0-9!@#]{8,16}", other in "[A-Za-z0-9!@#]{8,16}") {
            prop_assume!(password != other);
            let err = validate_new_password(&password, &other).unwrap_err();
            prop_assert_eq!(err.first("confirmPassword"), Some(MSG_PASSWORD_MISMATCH));
        }
    }
}
