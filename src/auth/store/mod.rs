/// Refresh Token Store
///
/// Persistence for refresh token records, keyed by token value. The store is
/// the only shared state between requests, so single-use enforcement rests
/// on `try_mark_used` and `redeem_and_replace` being atomic compare-and-sets.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::auth::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::AppError;

pub use memory::InMemoryRefreshTokenStore;
pub use postgres::PgRefreshTokenStore;

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persist a new record and assign its id
    ///
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if `token_value` is taken
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AppError>;

    async fn find_by_value(&self, token_value: &str) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Set `is_used` without checking its current value
    ///
    /// # Errors
    /// `DatabaseError::NotFound` if no record has this id
    async fn mark_used(&self, id: i64) -> Result<(), AppError>;

    /// Atomically set `is_used` where it is still false and the token is not
    /// revoked. Returns whether this call performed the transition.
    async fn try_mark_used(&self, id: i64) -> Result<bool, AppError>;

    /// `try_mark_used(id)` and `create(replacement)` as one unit: either the
    /// old record is used and the replacement exists, or nothing changed.
    /// `Ok(None)` if the old record was already used or revoked.
    ///
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the replacement value is
    /// taken; the old record is left untouched
    async fn redeem_and_replace(
        &self,
        id: i64,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// # Errors
    /// `DatabaseError::NotFound` if no record has this id
    async fn revoke(&self, id: i64) -> Result<(), AppError>;
}
