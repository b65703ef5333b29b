//! Input validation for registration and login payloads

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{LoginCredentials, RegisterRequest};

/// Validate display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    let len = name.chars().count();
    if len < 2 {
        return Err("Name must be at least 2 characters long".to_string());
    }

    if len > 100 {
        return Err("Name must be at most 100 characters long".to_string());
    }

    Ok(())
}

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 30 {
        return Err("Username must be at most 30 characters long".to_string());
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Username can only contain letters and numbers".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 255 {
        return Err("Email must be at most 255 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Validate a registration payload, reporting the first failing field
pub fn validate_registration(request: &RegisterRequest) -> Result<(), String> {
    validate_name(&request.name)?;
    validate_email(&request.email)?;
    validate_username(&request.username)?;
    validate_password(&request.password)
}

/// Validate the shape of login input. Credentials themselves are checked
/// against the store, so only presence and email format matter here.
pub fn validate_login(credentials: &LoginCredentials) -> Result<(), String> {
    validate_email(&credentials.email)?;
    if credentials.password.is_empty() {
        return Err("Password is required".to_string());
    }
    Ok(())
}
