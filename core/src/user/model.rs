//! User records and registration input.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{Result, ValidationErrors};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_FULL_NAME_LEN: usize = 255;

const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// A registered user. `password_hash` never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of a registration request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Registration data that passed validation. The password is still plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl RegisterInput {
    pub fn validate(self) -> Result<Registration> {
        let mut errors = ValidationErrors::new();

        let email = check_email(self.email.as_deref().unwrap_or(""), &mut errors);
        let password = self.password.unwrap_or_default();
        check_password(&password, &mut errors);

        let full_name = self.full_name.as_deref().unwrap_or("").trim().to_string();
        let name_len = full_name.chars().count();
        if name_len == 0 || name_len > MAX_FULL_NAME_LEN {
            errors.push(
                "fullName",
                format!(
                    "Full name is required and must be less than {} characters",
                    MAX_FULL_NAME_LEN
                ),
            );
        } else if !full_name
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        {
            errors.push("fullName", "Full name can only contain letters and spaces");
        }

        errors.into_result()?;
        Ok(Registration {
            email,
            password,
            full_name,
        })
    }
}

/// Body of a login request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginInput {
    /// Returns the normalized email and the password.
    pub fn validate(self) -> Result<(String, String)> {
        let mut errors = ValidationErrors::new();
        let email = check_email(self.email.as_deref().unwrap_or(""), &mut errors);
        let password = self.password.unwrap_or_default();
        if password.is_empty() {
            errors.push("password", "Password is required");
        }
        errors.into_result()?;
        Ok((email, password))
    }
}

/// Trims and lower-cases an email, recording an error unless it looks like `local@domain.tld`.
fn check_email(raw: &str, errors: &mut ValidationErrors) -> String {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, rest)| !host.is_empty() && !rest.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        errors.push("email", "Email must be a valid email address");
    }
    email
}

fn check_password(password: &str, errors: &mut ValidationErrors) {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        errors.push(
            "password",
            format!(
                "Password must be between {} and {} characters",
                MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
            ),
        );
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("password", "Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("password", "Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("password", "Password must contain at least one number");
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        errors.push("password", "Password must contain at least one special character");
    }
}
