//! HS256 bearer tokens.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Claims carried by relay access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Login name of the authenticated user.
    pub username: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// A caller whose token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    /// Login name taken from the verified token.
    pub username: String,
}

/// Verifies (and, for tooling and tests, issues) HS256 tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<[u8]>,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Creates a verifier for the given shared secret.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    /// Validates `token` and returns the principal it names.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Unauthorized`] for a bad signature, an expired
    /// token, or missing claims.
    pub fn verify(&self, token: &str) -> Result<Principal, RelayError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|err| {
            tracing::debug!(error = %err, "token rejected");
            RelayError::Unauthorized
        })?;

        if data.claims.username.is_empty() {
            return Err(RelayError::Unauthorized);
        }
        Ok(Principal {
            username: data.claims.username,
        })
    }

    /// Issues a token for `username` valid for `ttl_secs` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if encoding fails.
    pub fn issue(&self, username: &str, ttl_secs: i64) -> Result<String, RelayError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            username: username.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| RelayError::Internal(e.to_string()))
    }
}
