//! In-process identity provider used by tests and local runs without Postgres

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::password::{hash_password_blocking, verify_password_blocking, DecoyHash, DEFAULT_COST};
use super::{Identity, IdentityProvider};
use crate::error::{AppError, ValidationError};

struct UserEntry {
    identity: Identity,
    password_hash: String,
}

pub struct InMemoryIdentityProvider {
    users: RwLock<HashMap<Uuid, UserEntry>>,
    cost: u32,
    decoy: DecoyHash,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::with_cost(DEFAULT_COST)
    }

    /// Use a specific bcrypt cost (4 is the cheapest bcrypt accepts)
    pub fn with_cost(cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            cost,
            decoy: DecoyHash::new(cost),
        }
    }

    /// Drop a user, e.g. to simulate deletion between issue and rotate
    pub async fn remove(&self, id: Uuid) -> bool {
        self.users.write().await.remove(&id).is_some()
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.identity.email == email)
            .map(|u| u.identity.clone()))
    }

    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let users = self.users.read().await;
        Ok(users.get(&id).map(|u| u.identity.clone()))
    }

    async fn verify_password(&self, identity: &Identity, plaintext: &str) -> Result<bool, AppError> {
        let hash = match self.users.read().await.get(&identity.id) {
            Some(user) => user.password_hash.clone(),
            None => return Ok(false),
        };
        verify_password_blocking(plaintext.to_string(), hash).await
    }

    async fn verify_decoy_password(&self, plaintext: &str) -> Result<(), AppError> {
        self.decoy.verify(plaintext).await
    }

    async fn create_identity(
        &self,
        _name: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError> {
        let password_hash = hash_password_blocking(password.to_string(), self.cost).await?;

        let mut users = self.users.write().await;
        if users.values().any(|u| u.identity.email == email) {
            return Err(ValidationError::EmailAlreadyExists.into());
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        users.insert(
            identity.id,
            UserEntry {
                identity: identity.clone(),
                password_hash,
            },
        );

        Ok(identity)
    }
}
