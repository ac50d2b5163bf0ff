//! JWT token management

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// Shortest signing secret accepted, in bytes
pub const MIN_SECRET_LENGTH: usize = 16;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 8 * 3600;

/// Longest token lifetime accepted
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 3600;

/// Identity a token is issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User ID
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Role name, compared verbatim by role gates
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Identity portion of the claims, without timing
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl JwtManager {
    /// Create a new JWT manager
    ///
    /// Fails when the secret is blank or shorter than [`MIN_SECRET_LENGTH`]
    /// bytes, or when the TTL is not positive or exceeds
    /// [`MAX_TOKEN_TTL_SECS`].
    pub fn new(secret: &str, token_ttl: Duration) -> Result<Self, AuthError> {
        if secret.trim().is_empty() {
            return Err(AuthError::Configuration(
                "JWT secret is not configured".to_string(),
            ));
        }
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::Configuration(format!(
                "JWT secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if token_ttl <= Duration::zero() {
            return Err(AuthError::Configuration(
                "Token TTL must be positive".to_string(),
            ));
        }
        if token_ttl > Duration::seconds(MAX_TOKEN_TTL_SECS)
            || Utc::now().checked_add_signed(token_ttl).is_none()
        {
            return Err(AuthError::Configuration(format!(
                "Token TTL must not exceed {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
        })
    }

    /// Configured token lifetime
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Issue a token with the configured lifetime
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_at(identity, self.token_ttl, Utc::now())
    }

    /// Issue a token with an explicit lifetime
    pub fn issue_with_ttl(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        self.issue_at(identity, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(
        &self,
        identity: &Identity,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let exp = now.checked_add_signed(ttl).ok_or_else(|| {
            AuthError::Configuration(format!("Token expiry out of range for TTL {}", ttl))
        })?;

        let claims = Claims {
            id: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        debug!("Generating token for user: {}", identity.id);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Validate a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Validate a token against an explicit clock
    ///
    /// A token is accepted only if its signature checks out and `now`
    /// is strictly before `exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the supplied clock, without leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            AuthError::InvalidToken
        })?;

        if now.timestamp() >= token_data.claims.exp {
            debug!("Token rejected: expired at {}", token_data.claims.exp);
            return Err(AuthError::InvalidToken);
        }

        Ok(token_data.claims)
    }
}
