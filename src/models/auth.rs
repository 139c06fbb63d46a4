//! Authentication-related models

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{user::UserResponse, Role};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{N} .'\-]+$").expect("valid name regex"));

/// Session principal: who is calling and with which role.
/// Rebuilt on every request from a validated token plus an account lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "Email is invalid."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 50, message = "Name must be between 3 and 50 characters."),
        regex(path = *NAME_RE, message = "Name contains invalid characters.")
    )]
    pub name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "Email is invalid."))]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
}

/// 反序列化时去掉首尾空白，校验看到的就是实际查找用的值
fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

/// `{message?, user}` body returned by auth and user endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: UserResponse,
}

impl UserEnvelope {
    pub fn new(user: UserResponse) -> Self {
        Self {
            message: None,
            user,
        }
    }

    pub fn with_message(message: &str, user: UserResponse) -> Self {
        Self {
            message: Some(message.to_string()),
            user,
        }
    }
}

/// Plain message body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Normalize an email for lookup and storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Password policy: 8..=128 chars with upper, lower, digit and special character
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    let message = if !(8..=128).contains(&len) {
        Some("Password must be between 8 and 128 characters.")
    } else if !password.chars().any(|c| c.is_uppercase()) {
        Some("Password must contain at least one uppercase letter.")
    } else if !password.chars().any(|c| c.is_lowercase()) {
        Some("Password must contain at least one lowercase letter.")
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("Password must contain at least one digit.")
    } else if !password.chars().any(|c| !c.is_alphanumeric()) {
        Some("Password must contain at least one special character.")
    } else {
        None
    };

    match message {
        Some(msg) => {
            Err(ValidationError::new("password_strength").with_message(Cow::Borrowed(msg)))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Valid1!@").is_ok());
        assert!(validate_password_strength("Sh0rt!").is_err());
        assert!(validate_password_strength("lowercase1!").is_err());
        assert!(validate_password_strength("UPPERCASE1!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSpecial12").is_err());
    }

    #[test]
    fn test_register_request_reports_each_field() {
        let req = RegisterRequest {
            name: "x".to_string(),
            email: "not-an-email".to_string(),
            password: "weak".to_string(),
        };

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_register_request_accepts_valid_input() {
        let req = RegisterRequest {
            name: "Jean-Luc O'Neil".to_string(),
            email: "a@b.com".to_string(),
            password: "Valid1!@".to_string(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_principal_role_membership() {
        let principal = Principal {
            id: Uuid::new_v4(),
            role: Role::User,
        };
        assert!(principal.has_role(&[Role::User, Role::Admin]));
        assert!(!principal.has_role(&[Role::Admin]));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
    }

    #[test]
    fn test_request_emails_trimmed_before_validation() {
        let login: LoginRequest =
            serde_json::from_str(r#"{"email":"  a@b.com ","password":"x"}"#).unwrap();
        assert_eq!(login.email, "a@b.com");
        assert!(login.validate().is_ok());

        let register: RegisterRequest = serde_json::from_str(
            r#"{"name":"Ada Lovelace","email":" ada@b.com\t","password":"Valid1!@"}"#,
        )
        .unwrap();
        assert_eq!(register.email, "ada@b.com");
        assert!(register.validate().is_ok());
    }
}
