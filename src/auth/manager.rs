/// Token Lifecycle Manager
///
/// Issues access/refresh pairs and rotates them. Owns every business rule:
/// lifetimes, jti binding between the two tokens, and single use of refresh
/// tokens. Holds no mutable state of its own; the store is the only
/// synchronization point between concurrent requests.
///
/// Rotation accepts the access token whether or not it has expired. Only its
/// signature and its `jti` matter; `exp` is logged but not enforced.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::auth::jwt::AccessTokenCodec;
use crate::auth::refresh_token::{value_hint, NewRefreshToken, RefreshTokenState};
use crate::auth::signing_key::SigningKey;
use crate::auth::store::RefreshTokenStore;
use crate::auth::token_generator::{OsRngTokenGenerator, RefreshTokenGenerator};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::identity::{Identity, IdentityProvider};

/// Access token and refresh token value handed back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenManager {
    codec: AccessTokenCodec,
    store: Arc<dyn RefreshTokenStore>,
    identities: Arc<dyn IdentityProvider>,
    generator: Arc<dyn RefreshTokenGenerator>,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    store_timeout: Duration,
}

impl TokenManager {
    /// # Errors
    /// Returns a config error if the signing secret is unusable
    pub fn new(
        settings: &JwtSettings,
        store: Arc<dyn RefreshTokenStore>,
        identities: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AppError> {
        let key = SigningKey::from_settings(settings)?;

        Ok(Self {
            codec: AccessTokenCodec::new(key, settings.issuer.clone()),
            store,
            identities,
            generator: Arc::new(OsRngTokenGenerator),
            access_token_expiry: settings.access_token_expiry,
            refresh_token_expiry: settings.refresh_token_expiry,
            store_timeout: settings.store_timeout(),
        })
    }

    pub fn with_generator(mut self, generator: Arc<dyn RefreshTokenGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    /// Mint a new pair for `identity`. The only path that creates refresh
    /// token records.
    ///
    /// # Errors
    /// - `DatabaseError::UniqueConstraintViolation` if the value collided twice
    /// - `DatabaseError::Unavailable` if the store timed out
    pub async fn issue(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        let access = self.codec.issue(identity, self.access_token_expiry)?;

        let mut retried = false;
        let record = loop {
            let token = self.new_refresh_token(&access.claims.jti, identity);

            match self.bounded("create", self.store.create(token)).await {
                Ok(record) => break record,
                Err(err) if err.is_conflict() && !retried => {
                    tracing::warn!(user_id = %identity.id, "Refresh token value collided, regenerating");
                    retried = true;
                }
                Err(err) => return Err(err),
            }
        };

        tracing::info!(
            user_id = %identity.id,
            jti = %record.jwt_id,
            refresh_token_id = record.id,
            "Token pair issued"
        );

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: record.token_value,
        })
    }

    /// Exchange a signed access token and its paired refresh token for a new
    /// pair. The presented refresh token is marked used in the same store
    /// operation that persists its replacement, so it is redeemed at most
    /// once and a failed rotation leaves it usable.
    ///
    /// # Errors
    /// - `AuthError::TokenInvalid` for a bad signature, an unknown, used or
    ///   revoked refresh token, a pairing mismatch, or a deleted identity
    /// - `AuthError::TokenExpired` if the refresh token is past its expiry
    /// - `DatabaseError::Unavailable` if the store timed out; the presented
    ///   pair can be retried
    pub async fn rotate(&self, access_token: &str, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .codec
            .verify_structure_and_signature(access_token)
            .map_err(|e| reject("signature", &e.to_string()))?;

        tracing::debug!(
            jti = %claims.jti,
            access_token_expired = claims.is_expired(),
            "Access token accepted for rotation"
        );

        let record = self
            .bounded("find_by_value", self.store.find_by_value(refresh_token))
            .await?
            .ok_or_else(|| reject("missing", value_hint(refresh_token)))?;

        let now = Utc::now();
        match record.state_at(now) {
            RefreshTokenState::Redeemed => return Err(reject("used", record.value_hint())),
            RefreshTokenState::Revoked => return Err(reject("revoked", record.value_hint())),
            RefreshTokenState::Active | RefreshTokenState::Expired => {}
        }

        if record.jwt_id != claims.jti {
            return Err(reject("jti_mismatch", record.value_hint()));
        }

        if record.is_expired_at(now) {
            tracing::warn!(
                check = "expired",
                user_id = %record.user_id,
                refresh_token_id = record.id,
                "Token rotation rejected"
            );
            return Err(AuthError::TokenExpired.into());
        }

        let identity = self
            .bounded("find_identity_by_id", self.identities.find_identity_by_id(record.user_id))
            .await?
            .ok_or_else(|| reject("identity_missing", record.value_hint()))?;

        let access = self.codec.issue(&identity, self.access_token_expiry)?;

        let mut retried = false;
        let replacement = loop {
            let token = self.new_refresh_token(&access.claims.jti, &identity);

            match self
                .bounded("redeem_and_replace", self.store.redeem_and_replace(record.id, token))
                .await
            {
                Ok(Some(replacement)) => break replacement,
                Ok(None) => return Err(reject("race_lost", record.value_hint())),
                Err(err) if err.is_conflict() && !retried => {
                    tracing::warn!(user_id = %identity.id, "Refresh token value collided, regenerating");
                    retried = true;
                }
                Err(err) => return Err(err),
            }
        };

        tracing::info!(
            user_id = %identity.id,
            jti = %replacement.jwt_id,
            redeemed_refresh_token_id = record.id,
            refresh_token_id = replacement.id,
            "Token pair rotated"
        );

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: replacement.token_value,
        })
    }

    /// Explicitly revoke a refresh token. Unknown values are rejected like
    /// any other invalid token.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AppError> {
        let record = self
            .bounded("find_by_value", self.store.find_by_value(refresh_token))
            .await?
            .ok_or_else(|| reject("missing", value_hint(refresh_token)))?;

        self.bounded("revoke", self.store.revoke(record.id)).await?;

        tracing::info!(
            user_id = %record.user_id,
            refresh_token_id = record.id,
            "Refresh token revoked"
        );
        Ok(())
    }

    fn new_refresh_token(&self, jti: &str, identity: &Identity) -> NewRefreshToken {
        NewRefreshToken::new(
            jti.to_string(),
            self.generator.generate(),
            identity.id,
            self.refresh_token_expiry,
        )
    }

    /// Run a store call under the configured timeout
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(AppError::Database(DatabaseError::Unavailable(format!(
                    "{} timed out",
                    operation
                ))))
            }
        }
    }
}

/// Log which check failed and collapse it into the single invalid-token class
fn reject(check: &'static str, detail: &str) -> AppError {
    tracing::warn!(check, detail, "Token rotation rejected");
    AppError::Auth(AuthError::TokenInvalid)
}
