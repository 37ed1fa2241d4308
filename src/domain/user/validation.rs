//! Identity validation rules
//!
//! Rule violations are reported as [`IdentityError`] values with a stable
//! `code` and a human readable `description`. They are returned to registration
//! callers verbatim.

use serde::{Deserialize, Serialize};

/// Characters allowed in a user name besides ASCII letters and digits
const ALLOWED_USER_NAME_CHARACTERS: &str = "-._@+";

/// A single rule violation reported by the identity gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityError {
    pub code: String,
    pub description: String,
}

impl IdentityError {
    fn new(code: &str, description: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            description: description.into(),
        }
    }

    pub fn duplicate_user_name(user_name: &str) -> Self {
        Self::new(
            "DuplicateUserName",
            format!("User name '{}' is already taken.", user_name),
        )
    }

    pub fn duplicate_email(email: &str) -> Self {
        Self::new("DuplicateEmail", format!("Email '{}' is already taken.", email))
    }

    pub fn invalid_user_name(user_name: &str) -> Self {
        Self::new(
            "InvalidUserName",
            format!(
                "User name '{}' is invalid, can only contain letters or digits.",
                user_name
            ),
        )
    }

    pub fn invalid_email(email: &str) -> Self {
        Self::new("InvalidEmail", format!("Email '{}' is invalid.", email))
    }

    pub fn password_too_short(length: usize) -> Self {
        Self::new(
            "PasswordTooShort",
            format!("Passwords must be at least {} characters.", length),
        )
    }

    pub fn password_requires_non_alphanumeric() -> Self {
        Self::new(
            "PasswordRequiresNonAlphanumeric",
            "Passwords must have at least one non alphanumeric character.",
        )
    }

    pub fn password_requires_digit() -> Self {
        Self::new(
            "PasswordRequiresDigit",
            "Passwords must have at least one digit ('0'-'9').",
        )
    }

    pub fn password_requires_lower() -> Self {
        Self::new(
            "PasswordRequiresLower",
            "Passwords must have at least one lowercase ('a'-'z').",
        )
    }

    pub fn password_requires_upper() -> Self {
        Self::new(
            "PasswordRequiresUpper",
            "Passwords must have at least one uppercase ('A'-'Z').",
        )
    }
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

/// Password policy enforced at registration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordOptions {
    pub required_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            required_length: 6,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

/// Validate a user name
///
/// Rules:
/// - Cannot be empty
/// - Only ASCII letters, digits and `-._@+`
pub fn validate_user_name(user_name: &str) -> Result<(), IdentityError> {
    let valid = !user_name.is_empty()
        && user_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ALLOWED_USER_NAME_CHARACTERS.contains(c));

    if valid {
        Ok(())
    } else {
        Err(IdentityError::invalid_user_name(user_name))
    }
}

/// Validate an email address
///
/// Only the shape is checked: one `@` with a non-empty local part and a
/// domain part without whitespace.
pub fn validate_email(email: &str) -> Result<(), IdentityError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(IdentityError::invalid_email(email))
    }
}

/// Validate a password against the policy, reporting every violated rule
pub fn validate_password(password: &str, options: &PasswordOptions) -> Vec<IdentityError> {
    let mut errors = Vec::new();

    if password.chars().count() < options.required_length {
        errors.push(IdentityError::password_too_short(options.required_length));
    }

    if options.require_non_alphanumeric && password.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(IdentityError::password_requires_non_alphanumeric());
    }

    if options.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(IdentityError::password_requires_digit());
    }

    if options.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(IdentityError::password_requires_lower());
    }

    if options.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(IdentityError::password_requires_upper());
    }

    errors
}
