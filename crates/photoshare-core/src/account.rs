use serde::Serialize;

use crate::error::WorkflowError;
use crate::types::Credentials;

const MIN_PASSWORD_LEN: usize = 6;

/// A validated sign-up request.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    name: String,
    email: String,
    password: String,
}

impl Registration {
    /// Validate locally before anything is sent.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: &str,
    ) -> Result<Self, WorkflowError> {
        let name = name.into().trim().to_string();
        let email = email.into().trim().to_string();
        let password = password.into();

        if name.is_empty() {
            return Err(WorkflowError::InvalidRegistration("name is required"));
        }
        if !email.contains('@') {
            return Err(WorkflowError::InvalidRegistration("email address is invalid"));
        }
        if password != confirm_password {
            return Err(WorkflowError::InvalidRegistration("passwords do not match"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(WorkflowError::InvalidRegistration(
                "password must be at least 6 characters",
            ));
        }

        Ok(Self {
            name,
            email,
            password,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Credentials for the sign-in that follows registration.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.clone(), self.password.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_registration() {
        let reg = Registration::new(" Ann ", "ann@x.com", "secret1", "secret1").unwrap();
        assert_eq!(reg.name(), "Ann");
        assert_eq!(reg.credentials().email, "ann@x.com");
    }

    #[test]
    fn test_password_mismatch() {
        let err = Registration::new("Ann", "ann@x.com", "secret1", "secret2").unwrap_err();
        assert_eq!(err, WorkflowError::InvalidRegistration("passwords do not match"));
    }

    #[test]
    fn test_short_password() {
        assert!(Registration::new("Ann", "ann@x.com", "abc", "abc").is_err());
    }

    #[test]
    fn test_bad_email_and_empty_name() {
        assert!(Registration::new("Ann", "ann.x.com", "secret1", "secret1").is_err());
        assert!(Registration::new("  ", "ann@x.com", "secret1", "secret1").is_err());
    }
}
