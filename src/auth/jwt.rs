//! JWT token generation and validation
//! Implements access token + refresh token pattern

use crate::{config::SecurityConfig, error::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token kind, carried in the claims so one can never stand in for the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims. Only the account id is carried; roles are re-read from the store.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Token type (access or refresh)
    pub token_type: TokenType,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    /// Parse the subject back into an account id
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| {
            tracing::debug!("Token subject is not a UUID");
            AppError::Unauthorized
        })
    }
}

/// Token pair issued at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// JWT service
pub struct JwtService {
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
    access_token_exp_secs: u64,
    refresh_token_exp_secs: u64,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        let access_secret = config.access_token_secret.expose_secret();
        let refresh_secret = config.refresh_token_secret.expose_secret();

        // Ensure secrets are at least 32 bytes for HS256
        if access_secret.len() < 32 || refresh_secret.len() < 32 {
            return Err(AppError::Config("Token secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            access_keys: SigningKeys::from_secret(access_secret),
            refresh_keys: SigningKeys::from_secret(refresh_secret),
            access_token_exp_secs: config.access_token_exp_secs,
            refresh_token_exp_secs: config.refresh_token_exp_secs,
        })
    }

    pub fn access_token_exp_secs(&self) -> u64 {
        self.access_token_exp_secs
    }

    pub fn refresh_token_exp_secs(&self) -> u64 {
        self.refresh_token_exp_secs
    }

    /// Generate access token
    pub fn generate_access_token(&self, user_id: &Uuid) -> Result<String, AppError> {
        self.sign(user_id, TokenType::Access, self.access_token_exp_secs as i64)
    }

    /// Generate refresh token
    pub fn generate_refresh_token(&self, user_id: &Uuid) -> Result<String, AppError> {
        self.sign(user_id, TokenType::Refresh, self.refresh_token_exp_secs as i64)
    }

    /// Generate token pair
    pub fn generate_token_pair(&self, user_id: &Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id)?,
            refresh_token: self.generate_refresh_token(user_id)?,
        })
    }

    /// Sign a token of the given type, valid for `lifetime_secs` from now.
    /// A negative lifetime yields an already expired token.
    pub fn sign(
        &self,
        user_id: &Uuid,
        token_type: TokenType,
        lifetime_secs: i64,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(lifetime_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.keys(token_type).encoding).map_err(|e| {
            tracing::error!("Failed to encode {:?} token: {:?}", token_type, e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })
    }

    /// Validate access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AppError> {
        self.validate(token, TokenType::Access)
    }

    /// Validate refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AppError> {
        self.validate(token, TokenType::Refresh)
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.keys(expected).decoding, &validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::Unauthorized
            })?
            .claims;

        if claims.token_type != expected {
            tracing::debug!(
                "Token type mismatch: expected {:?}, got {:?}",
                expected,
                claims.token_type
            );
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }

    fn keys(&self, token_type: TokenType) -> &SigningKeys {
        match token_type {
            TokenType::Access => &self.access_keys,
            TokenType::Refresh => &self.refresh_keys,
        }
    }
}
