//! Postgres-backed identity provider over the `users` table

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::password::{hash_password_blocking, verify_password_blocking, DecoyHash, DEFAULT_COST};
use super::{Identity, IdentityProvider};
use crate::error::{AppError, ValidationError};

pub struct PgIdentityProvider {
    pool: PgPool,
    decoy: DecoyHash,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            decoy: DecoyHash::new(DEFAULT_COST),
        }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, email FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, email)| Identity { id, email }))
    }

    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let row = sqlx::query_as::<_, (Uuid, String)>("SELECT id, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, email)| Identity { id, email }))
    }

    async fn verify_password(&self, identity: &Identity, plaintext: &str) -> Result<bool, AppError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(identity.id)
            .fetch_optional(&self.pool)
            .await?;

        match hash {
            Some(hash) => verify_password_blocking(plaintext.to_string(), hash).await,
            None => Ok(false),
        }
    }

    async fn verify_decoy_password(&self, plaintext: &str) -> Result<(), AppError> {
        self.decoy.verify(plaintext).await
    }

    async fn create_identity(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError> {
        let password_hash = hash_password_blocking(password.to_string(), DEFAULT_COST).await?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .bind(&password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            err if err.is_conflict() => AppError::Validation(ValidationError::EmailAlreadyExists),
            err => err,
        })?;

        Ok(Identity {
            id,
            email: email.to_string(),
        })
    }
}
