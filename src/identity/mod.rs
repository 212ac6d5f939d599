/// Identity collaborator
///
/// The token subsystem only needs to look identities up and check
/// passwords. Registration uses `create_identity`.

mod memory;
mod password;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

pub use memory::InMemoryIdentityProvider;
pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking, DecoyHash,
    DEFAULT_COST,
};
pub use postgres::PgIdentityProvider;

/// The verified user a token pair is issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;

    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    /// False for a wrong password and for an identity without credentials
    async fn verify_password(&self, identity: &Identity, plaintext: &str) -> Result<bool, AppError>;

    /// Run one password verification against a hash no account owns. Login
    /// calls this for unknown emails.
    async fn verify_decoy_password(&self, plaintext: &str) -> Result<(), AppError>;

    /// # Errors
    /// `ValidationError::EmailAlreadyExists` if the email is taken
    async fn create_identity(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError>;
}
