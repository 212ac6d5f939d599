//! Postgres refresh token store
//!
//! Token values are hashed with SHA-256 before they touch the database;
//! lookups hash the presented value. The plaintext only ever lives with the
//! client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::RefreshTokenStore;
use crate::auth::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::error::{AppError, DatabaseError};

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Hash a refresh token value using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: i64,
    jwt_id: String,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_used: bool,
    is_revoked: bool,
}

impl RefreshTokenRow {
    fn into_record(self, token_value: &str) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: self.id,
            jwt_id: self.jwt_id,
            token_value: token_value.to_string(),
            user_id: self.user_id,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            is_used: self.is_used,
            is_revoked: self.is_revoked,
        }
    }
}

const INSERT_TOKEN: &str = r#"
    INSERT INTO refresh_tokens (jwt_id, token_hash, user_id, issued_at, expires_at)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id
"#;

const CLAIM_TOKEN: &str = r#"
    UPDATE refresh_tokens
    SET is_used = true
    WHERE id = $1 AND is_used = false AND is_revoked = false
"#;

fn insert_query(
    token: &NewRefreshToken,
) -> sqlx::query::QueryScalar<'static, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    sqlx::query_scalar::<_, i64>(INSERT_TOKEN)
        .bind(token.jwt_id.clone())
        .bind(hash_token(&token.token_value))
        .bind(token.user_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
}

fn ensure_found(rows_affected: u64, id: i64) -> Result<(), AppError> {
    if rows_affected == 0 {
        return Err(AppError::Database(DatabaseError::NotFound(format!(
            "refresh token {}",
            id
        ))));
    }
    Ok(())
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AppError> {
        let id = insert_query(&token).fetch_one(&self.pool).await?;

        Ok(token.into_record(id))
    }

    async fn find_by_value(&self, token_value: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, jwt_id, user_id, issued_at, expires_at, is_used, is_revoked
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(token_value))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.into_record(token_value)))
    }

    async fn mark_used(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE refresh_tokens SET is_used = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_found(result.rows_affected(), id)
    }

    async fn try_mark_used(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(CLAIM_TOKEN)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn redeem_and_replace(
        &self,
        id: i64,
        replacement: NewRefreshToken,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        // An error return drops `tx`, which rolls the claim back
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(CLAIM_TOKEN).bind(id).execute(&mut tx).await?;
        if claimed.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        let new_id = insert_query(&replacement).fetch_one(&mut tx).await?;
        tx.commit().await?;

        Ok(Some(replacement.into_record(new_id)))
    }

    async fn revoke(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE refresh_tokens SET is_revoked = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_found(result.rows_affected(), id)
    }
}
