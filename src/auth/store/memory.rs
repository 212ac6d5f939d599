//! In-memory refresh token store
//!
//! All mutations take the write lock, which makes `try_mark_used` and
//! `redeem_and_replace` real compare-and-sets within one process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::RefreshTokenStore;
use crate::auth::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::{AppError, DatabaseError};

pub struct InMemoryRefreshTokenStore {
    /// Keyed by token value
    tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
    next_id: AtomicI64,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    /// Replace the record with `id` by `update(record)`
    async fn update<F>(&self, id: i64, update: F) -> Result<RefreshTokenRecord, AppError>
    where
        F: FnOnce(&RefreshTokenRecord) -> RefreshTokenRecord + Send,
    {
        let mut tokens = self.tokens.write().await;
        let record = tokens
            .values_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))?;
        *record = update(record);
        Ok(record.clone())
    }
}

impl Default for InMemoryRefreshTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: i64) -> AppError {
    AppError::Database(DatabaseError::NotFound(format!("refresh token {}", id)))
}

fn value_taken() -> AppError {
    AppError::Database(DatabaseError::UniqueConstraintViolation(
        "refresh_tokens_token_value_key".to_string(),
    ))
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AppError> {
        let mut tokens = self.tokens.write().await;

        if tokens.contains_key(&token.token_value) {
            return Err(value_taken());
        }

        let record = token.into_record(self.next_id.fetch_add(1, Ordering::SeqCst));
        tokens.insert(record.token_value.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_value(&self, token_value: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token_value).cloned())
    }

    async fn mark_used(&self, id: i64) -> Result<(), AppError> {
        self.update(id, |record| RefreshTokenRecord {
            is_used: true,
            ..record.clone()
        })
        .await
        .map(|_| ())
    }

    async fn try_mark_used(&self, id: i64) -> Result<bool, AppError> {
        let mut tokens = self.tokens.write().await;
        let record = tokens
            .values_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))?;

        match record.redeem() {
            Ok(redeemed) => {
                *record = redeemed;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn redeem_and_replace(
        &self,
        id: i64,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let mut tokens = self.tokens.write().await;

        let redeemed = match tokens.values().find(|t| t.id == id) {
            Some(record) => match record.redeem() {
                Ok(redeemed) => redeemed,
                Err(_) => return Ok(None),
            },
            None => return Err(not_found(id)),
        };

        if tokens.contains_key(&replacement.token_value) {
            return Err(value_taken());
        }

        let record = replacement.into_record(self.next_id.fetch_add(1, Ordering::SeqCst));
        tokens.insert(redeemed.token_value.clone(), redeemed);
        tokens.insert(record.token_value.clone(), record.clone());
        Ok(Some(record))
    }

    async fn revoke(&self, id: i64) -> Result<(), AppError> {
        self.update(id, RefreshTokenRecord::revoke).await.map(|_| ())
    }
}
