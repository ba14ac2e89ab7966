//! Credential checks shared by the sign-up/sign-in forms and the server.

use crate::error::ShareError;

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_email(email: &str) -> Result<(), ShareError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ShareError::Validation("Email is required".to_string()));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ShareError::Validation("Invalid email address".to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<(), ShareError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ShareError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), ShareError> {
    validate_email(email)?;
    validate_password(password)
}

/// Trims message content and rejects empty posts.
pub fn normalize_content(content: &str) -> Result<String, ShareError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ShareError::Validation("Message cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}
