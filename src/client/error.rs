//! 客户端错误类型
//! 把服务端的状态码与 `{message, errors}` 错误体还原为类型化错误

use crate::error::{ErrorResponse, FieldError};
use thiserror::Error;

/// 错误体在错误消息中的最大长度
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// 截断过长的响应体
    fn truncate_body(body: &str) -> String {
        if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", head, body.len())
        }
    }

    /// 根据非 2xx 响应构造错误
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: Option<ErrorResponse> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .map(|p| p.message.clone())
            .unwrap_or_else(|| Self::truncate_body(body));

        match status {
            400 => ClientError::Validation {
                message,
                errors: parsed.map(|p| p.errors).unwrap_or_default(),
            },
            401 => ClientError::Unauthorized(message),
            403 => ClientError::Forbidden(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            429 => ClientError::RateLimited,
            500..=599 => ClientError::Server(message),
            _ => ClientError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    /// 字段级校验错误（非校验错误返回空切片）
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ClientError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_reads_server_message() {
        let err = ClientError::from_status(401, r#"{"message":"Unauthorized!"}"#);
        assert!(matches!(err, ClientError::Unauthorized(ref m) if m == "Unauthorized!"));

        let err = ClientError::from_status(409, r#"{"message":"Email already exists!"}"#);
        assert!(matches!(err, ClientError::Conflict(ref m) if m == "Email already exists!"));

        assert!(matches!(ClientError::from_status(429, ""), ClientError::RateLimited));
        assert!(matches!(ClientError::from_status(503, "down"), ClientError::Server(_)));
        assert!(matches!(
            ClientError::from_status(418, "teapot"),
            ClientError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_validation_keeps_field_errors() {
        let body = r#"{"message":"Validation error.","errors":[{"field":"email","message":"Email is invalid."}]}"#;
        let err = ClientError::from_status(400, body);

        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "email");
    }

    #[test]
    fn test_long_plain_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH * 2);
        match ClientError::from_status(500, &body) {
            ClientError::Server(message) => {
                assert!(message.contains("truncated"));
                assert!(message.len() < body.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
