/// Access token claims
///
/// Payload of a signed access token: the identity it was issued to, the
/// unique `jti` that pairs it with exactly one refresh token, and
/// server-computed timestamps (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::identity::Identity;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Unique per issuance; equals `jwt_id` of the paired refresh token
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    /// Fresh claims for `identity` with a new `jti`, valid for `ttl_seconds`
    /// from now.
    pub fn new(identity: &Identity, ttl_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl_seconds,
            iss: issuer,
        }
    }

    /// # Errors
    /// Returns an invalid-token error if the subject is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }

    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }
}
